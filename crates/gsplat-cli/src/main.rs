// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use mimalloc::MiMalloc;

use gsplat::prelude::*;
use gsplat::{formats, html, io, transform};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const USAGE: &str = "\
gsplat - Gaussian splat point cloud conversion, merging, and editing

USAGE:
    gsplat [GLOBAL] <input> [ACTIONS]... <output> [ACTIONS]

GLOBAL:
    -w, --overwrite              overwrite an existing output path
    -g, --no-gpu                 disable GPU k-means clustering (currently a no-op)
    -i, --iterations N           k-means iterations (default 10)
    -p, --cameraPos x,y,z        HTML viewer camera position (default 2,2,-2)
    -e, --cameraTarget x,y,z     HTML viewer camera target (default 0,0,0)
    -h, --help                   print this message
    -v, --version                print the version

PER-FILE ACTIONS:
    -t x,y,z                     translate
    -r x,y,z                     rotate, degrees
    -s x                         uniform scale
    -n                           drop rows containing NaN
    -c name,cmp,value            filter rows: cmp is one of < <= > >= == !=
    -b 0|1|2|3                   truncate spherical-harmonic band
    -P name=value[,name=value]   generator-script parameter
";

struct GlobalOptions {
	overwrite: bool,
	#[allow(dead_code)]
	no_gpu: bool,
	iterations: u32,
	camera_pos: [f32; 3],
	camera_target: [f32; 3],
}

impl Default for GlobalOptions {
	fn default() -> Self {
		Self { overwrite: false, no_gpu: false, iterations: 10, camera_pos: [2.0, 2.0, -2.0], camera_target: [0.0, 0.0, 0.0] }
	}
}

struct FileSpec {
	path: PathBuf,
	actions: Vec<Action>,
	pending_translate: Option<[f32; 3]>,
	pending_rotate: Option<[f32; 3]>,
	pending_scale: Option<f32>,
}

impl FileSpec {
	fn new(path: PathBuf) -> Self {
		Self { path, actions: Vec::new(), pending_translate: None, pending_rotate: None, pending_scale: None }
	}

	/// `-t`/`-r`/`-s` on one file compose into a single `mat4.setTRS`-style
	/// action (`p' = R*(s*p) + t`), not three independent mutations; flush
	/// whatever of them has been set before any other action runs.
	fn flush_trs(&mut self) {
		if self.pending_translate.is_none() && self.pending_rotate.is_none() && self.pending_scale.is_none() {
			return;
		}
		let translate = self.pending_translate.take().unwrap_or([0.0, 0.0, 0.0]);
		let rotate = self.pending_rotate.take().unwrap_or([0.0, 0.0, 0.0]);
		let scale = self.pending_scale.take().unwrap_or(1.0);
		self.actions.push(Action::Trs { translate, rotate, scale });
	}
}

fn parse_vec3(s: &str) -> Result<[f32; 3]> {
	let parts: Vec<&str> = s.split(',').collect();
	if parts.len() != 3 {
		bail!("expected 'x,y,z', got '{s}'");
	}
	let mut out = [0.0f32; 3];
	for (i, p) in parts.iter().enumerate() {
		out[i] = p.trim().parse().with_context(|| format!("bad number '{p}' in '{s}'"))?;
	}
	Ok(out)
}

fn parse_cmp(token: &str) -> Result<Cmp> {
	Ok(match token {
		"<" | "lt" => Cmp::Lt,
		"<=" | "lte" => Cmp::Lte,
		">" | "gt" => Cmp::Gt,
		">=" | "gte" => Cmp::Gte,
		"==" | "eq" => Cmp::Eq,
		"!=" | "neq" => Cmp::Neq,
		other => bail!("unknown comparison operator '{other}'"),
	})
}

/// Hand-rolled positional scanner: global flags, then any number of
/// `<path> [actions]...` groups, the last path being the output.
fn parse_args(args: &[String]) -> Result<(GlobalOptions, Vec<FileSpec>)> {
	let mut globals = GlobalOptions::default();
	let mut files: Vec<FileSpec> = Vec::new();
	let mut i = 0;

	while i < args.len() {
		let arg = args[i].as_str();

		match arg {
			"-w" | "--overwrite" => {
				globals.overwrite = true;
				i += 1;
			}
			"-g" | "--no-gpu" => {
				globals.no_gpu = true;
				i += 1;
			}
			"-i" | "--iterations" => {
				globals.iterations = args.get(i + 1).context("-i requires a value")?.parse()?;
				i += 2;
			}
			"-p" | "--cameraPos" => {
				globals.camera_pos = parse_vec3(args.get(i + 1).context("-p requires a value")?)?;
				i += 2;
			}
			"-e" | "--cameraTarget" => {
				globals.camera_target = parse_vec3(args.get(i + 1).context("-e requires a value")?)?;
				i += 2;
			}
			"-h" | "--help" => {
				print!("{USAGE}");
				std::process::exit(0);
			}
			"-v" | "--version" => {
				println!("gsplat {}", env!("CARGO_PKG_VERSION"));
				std::process::exit(0);
			}
			"-t" => {
				let v = parse_vec3(args.get(i + 1).context("-t requires a value")?)?;
				current_file(&mut files)?.pending_translate = Some(v);
				i += 2;
			}
			"-r" => {
				let v = parse_vec3(args.get(i + 1).context("-r requires a value")?)?;
				current_file(&mut files)?.pending_rotate = Some(v);
				i += 2;
			}
			"-s" => {
				let v: f32 = args.get(i + 1).context("-s requires a value")?.parse()?;
				current_file(&mut files)?.pending_scale = Some(v);
				i += 2;
			}
			"-n" => {
				let file = current_file(&mut files)?;
				file.flush_trs();
				file.actions.push(Action::FilterNaN);
				i += 1;
			}
			"-c" => {
				let spec = args.get(i + 1).context("-c requires a value")?;
				let parts: Vec<&str> = spec.splitn(3, ',').collect();
				if parts.len() != 3 {
					bail!("-c expects 'name,cmp,value', got '{spec}'");
				}
				let action = Action::FilterByValue {
					column: parts[0].to_string(),
					cmp: parse_cmp(parts[1])?,
					value: parts[2].parse()?,
				};
				let file = current_file(&mut files)?;
				file.flush_trs();
				file.actions.push(action);
				i += 2;
			}
			"-b" => {
				let band: u8 = args.get(i + 1).context("-b requires a value")?.parse()?;
				let file = current_file(&mut files)?;
				file.flush_trs();
				file.actions.push(Action::FilterBands(band));
				i += 2;
			}
			"-P" => {
				let spec = args.get(i + 1).context("-P requires a value")?;
				let file = current_file(&mut files)?;
				file.flush_trs();
				for pair in spec.split(',') {
					let (name, value) = pair.split_once('=').with_context(|| format!("-P expects 'name=value', got '{pair}'"))?;
					file.actions.push(Action::Param { name: name.to_string(), value: value.to_string() });
				}
				i += 2;
			}
			other if other.starts_with('-') => bail!("unrecognized flag '{other}'"),
			path => {
				if let Some(prev) = files.last_mut() {
					prev.flush_trs();
				}
				files.push(FileSpec::new(PathBuf::from(path)));
				i += 1;
			}
		}
	}

	if let Some(last) = files.last_mut() {
		last.flush_trs();
	}

	if files.len() < 2 {
		bail!("at least two positional paths are required (input(s) and output)");
	}
	Ok((globals, files))
}

fn current_file(files: &mut [FileSpec]) -> Result<&mut FileSpec> {
	files.last_mut().context("an action flag appeared before any input path")
}

fn main() -> ExitCode {
	tracing_subscriber::fmt::init();

	match run() {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("error: {err:#}");
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<()> {
	let args: Vec<String> = std::env::args().skip(1).collect();
	let (globals, mut files) = parse_args(&args)?;
	let output = files.pop().expect("length checked above");
	let inputs = files;

	if output.path.exists() && !globals.overwrite {
		bail!("output path {:?} already exists; pass -w/--overwrite", output.path);
	}

	let mut tables = Vec::with_capacity(inputs.len());
	for input in &inputs {
		let bytes = io::read_whole_file(&input.path).with_context(|| format!("reading {:?}", input.path))?;
		let table = formats::read(&input.path, &bytes).with_context(|| format!("decoding {:?}", input.path))?;
		let table = transform::apply_pipeline(table, &input.actions)
			.with_context(|| format!("applying actions to {:?}", input.path))?;
		tables.push(table);
	}

	let combined = DataTable::combine(&tables)?;
	let combined = transform::apply_pipeline(combined, &output.actions).context("applying output actions")?;

	let bytes = match formats::Format::from_path(&output.path)? {
		formats::Format::Html => {
			let ply_bytes = formats::ply_compressed::write(&combined)?;
			let page = html::InlineViewerTemplate.render(&ply_bytes, globals.camera_pos, globals.camera_target)?;
			page.into_bytes()
		}
		_ => formats::write(&output.path, &combined, globals.iterations)?,
	};

	io::write_atomic(&output.path, &bytes).with_context(|| format!("writing {:?}", output.path))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn args(tokens: &[&str]) -> Vec<String> {
		tokens.iter().map(|t| t.to_string()).collect()
	}

	#[test]
	fn t_r_s_on_one_file_coalesce_into_a_single_trs_action() {
		let (_globals, files) = parse_args(&args(&["in.ply", "-r", "0,90,0", "-t", "0,0,1", "-s", "2", "out.ply"])).unwrap();
		assert_eq!(files[0].actions.len(), 1);
		match files[0].actions[0] {
			Action::Trs { translate, rotate, scale } => {
				assert_eq!(translate, [0.0, 0.0, 1.0]);
				assert_eq!(rotate, [0.0, 90.0, 0.0]);
				assert_eq!(scale, 2.0);
			}
			ref other => panic!("expected a single Trs action, got {other:?}"),
		}
	}

	#[test]
	fn lone_translate_flag_still_produces_a_trs_action() {
		let (_globals, files) = parse_args(&args(&["in.ply", "-t", "1,2,3", "out.ply"])).unwrap();
		assert_eq!(files[0].actions.len(), 1);
		assert!(matches!(files[0].actions[0], Action::Trs { translate: [1.0, 2.0, 3.0], rotate: [0.0, 0.0, 0.0], scale: 1.0 }));
	}

	#[test]
	fn trs_flushes_before_a_filter_flag_in_between() {
		let (_globals, files) = parse_args(&args(&["in.ply", "-t", "1,0,0", "-n", "-s", "2", "out.ply"])).unwrap();
		assert_eq!(files[0].actions.len(), 2);
		assert!(matches!(files[0].actions[0], Action::Trs { translate: [1.0, 0.0, 0.0], scale: 1.0, .. }));
		assert!(matches!(files[0].actions[1], Action::FilterNaN));
	}

	#[test]
	fn requires_at_least_two_paths() {
		assert!(parse_args(&args(&["only_one.ply"])).is_err());
	}
}

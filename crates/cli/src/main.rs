use anyhow::{anyhow, bail, Context};
use config::{Config, File};
use log::{info, LevelFilter};
use quilt::{
    generate, timed, CancellationToken, GeneratedMap, GridMap, HeadlessHost,
    MapConfig, Seed, TileCatalog,
};
use serde::de::DeserializeOwned;
use simple_logger::SimpleLogger;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    process,
};
use structopt::StructOpt;
use strum::{Display, EnumString};

/// CLI for generating tile maps via Quilt.
#[derive(Debug, StructOpt)]
#[structopt(name = "quilt")]
struct Opt {
    /// Path to a config file that defines the map to be generated. Supported
    /// formats: JSON, TOML
    #[structopt(short, long)]
    config: Option<PathBuf>,

    /// Path to the tile catalog (modules, rules, and layers) to generate
    /// from. Supported formats: JSON, TOML. Required with --config.
    #[structopt(short = "t", long)]
    catalog: Option<PathBuf>,

    /// Override the seed from the config file. Numeric seeds are used as-is,
    /// anything else gets hashed.
    #[structopt(short, long)]
    seed: Option<String>,

    /// Path to an existing .bin map file to load
    #[structopt(short, long)]
    bin: Option<PathBuf>,

    /// If given, the generated map will be saved to this directory. The
    /// exact files that appear in the directory are defined by the output
    /// formats. See `--output-formats` for more info
    #[structopt(short, long)]
    output: Option<PathBuf>,

    /// The format(s) to output the map in. Supported formats:
    ///
    /// bin - Binary representation that can be reloaded by this CLI and
    ///   other tools later. Use this for persisting & sharing maps
    ///
    /// cfg - The full config object used for the map, in TOML format
    ///
    /// json - JSON representation. Similar to the binary format, but slower
    ///   and much less compact
    ///
    /// txt - Plain text drawing of the grid, one character per cell
    #[structopt(short = "f", long)]
    output_formats: Vec<OutputFormat>,

    /// The logging level to use during map generation. See
    /// https://docs.rs/log/0.4.11/log/enum.LevelFilter.html for options
    #[structopt(long, default_value = "info")]
    log_level: LevelFilter,
}

/// Different output formats.
#[derive(Copy, Clone, Debug, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
enum OutputFormat {
    // If you change this, make sure to update the help text for
    // `--output-formats`!
    /// Export the map in a serialized binary format, which can be
    /// deserialized later to recover the map
    Bin,
    /// Export the map's full config in a human-readable file
    Cfg,
    /// Export the map in a serialized JSON format, which can be deserialized
    /// later to recover the map. This is similar to the bin format, but is
    /// human readable at the cost of being slower and much less compact
    Json,
    /// Draw the grid as text
    Txt,
}

impl OutputFormat {
    fn file_ext(self) -> &'static str {
        match self {
            Self::Bin => "bin",
            Self::Cfg => "toml",
            Self::Json => "json",
            Self::Txt => "txt",
        }
    }
}

/// Load a JSON or TOML file into any deserializable type
fn load_file<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let mut settings = Config::new();
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow!("invalid character in path {:?}", path))?;
    settings
        .merge(File::with_name(path_str))
        .with_context(|| format!("error reading file {:?}", path))?;
    settings
        .try_into()
        .with_context(|| format!("error parsing file {:?}", path))
}

/// Draw the grid with north at the top. Each cell gets the first letter of
/// its module's ID: uppercase for origin cells, lowercase for the rest.
/// Empty cells are `.`.
fn render_text(grid: &GridMap) -> String {
    let width = grid.width() as usize;
    let mut output = String::with_capacity((width + 1) * grid.height() as usize);
    for row in grid.cells().chunks(width.max(1)).rev() {
        for cell in row {
            let letter = cell
                .module()
                .and_then(|module| module.as_str().chars().next())
                .unwrap_or('.');
            if cell.is_origin() {
                output.extend(letter.to_uppercase());
            } else {
                output.extend(letter.to_lowercase());
            }
        }
        output.push('\n');
    }
    output
}

/// Generate an output form of the map in the given format.
fn gen_output(
    output_dir: &Path,
    output_format: OutputFormat,
    map: &GeneratedMap,
) -> anyhow::Result<()> {
    fn generate_bytes(
        output_format: OutputFormat,
        map: &GeneratedMap,
    ) -> anyhow::Result<Vec<u8>> {
        Ok(match output_format {
            OutputFormat::Bin => map.to_bin()?,
            OutputFormat::Cfg => toml::to_string_pretty(&map.config)
                .context("error serializing config")?
                .into_bytes(),
            OutputFormat::Json => map.to_json()?.into_bytes(),
            OutputFormat::Txt => render_text(&map.grid).into_bytes(),
        })
    }

    let output_file_path = output_dir
        .join("map")
        .with_extension(output_format.file_ext());

    timed!(
        format!(
            "Generating {} output and writing to {:?}",
            output_format, &output_file_path
        ),
        log::Level::Info,
        {
            let bytes = generate_bytes(output_format, map)?;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&output_file_path)
                .with_context(|| {
                    format!("error opening output file {:?}", &output_file_path)
                })?;
            file.write_all(&bytes).with_context(|| {
                format!("error writing to file {:?}", &output_file_path)
            })?;
        }
    );

    Ok(())
}

/// Run the CLI with some options
fn run(opt: Opt) -> anyhow::Result<()> {
    SimpleLogger::new().with_level(opt.log_level).init()?;

    let map = match &opt {
        Opt {
            config: Some(config_path),
            catalog: Some(catalog_path),
            bin: None,
            ..
        } => {
            // Load config and catalog, and use them to generate a new map
            let mut config: MapConfig = load_file(config_path)?;
            if let Some(seed) = &opt.seed {
                config.seed = Seed::from(seed.as_str());
            }
            let catalog: TileCatalog = load_file(catalog_path)?;
            let mut host = HeadlessHost::new();
            let map =
                generate(config, &catalog, &mut host, CancellationToken::new())?;
            info!(
                "Generated {} instances over {} frames",
                host.requests.len(),
                host.frames
            );
            map
        }
        Opt {
            config: None,
            catalog: None,
            bin: Some(input_path),
            ..
        } => {
            // Load existing map from a file
            let file = OpenOptions::new()
                .read(true)
                .open(input_path)
                .with_context(|| {
                    format!("error opening map file {:?}", input_path)
                })?;
            let map = GeneratedMap::from_bin(file)?;
            info!("Loaded map from {:?}", input_path);
            map
        }
        _ => bail!(
            "must pass either --config and --catalog (to generate a new map) \
            or --bin (to load an existing map)"
        ),
    };

    // If an output dir was specified, write out output format(s) there
    if let Some(output_dir) = &opt.output {
        if opt.output_formats.is_empty() {
            bail!("output dir was specified, but no output formats were given")
        }
        fs::create_dir_all(output_dir)?;
        for output_format in &opt.output_formats {
            gen_output(output_dir, *output_format, &map)?;
        }
    }

    Ok(())
}

fn main() {
    let exit_code = match run(Opt::from_args()) {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            1
        }
    };
    process::exit(exit_code);
}

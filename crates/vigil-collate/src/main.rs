// SPDX-License-Identifier: MIT OR Apache-2.0
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use vigil_collate::modes::banners::BannerReports;
use vigil_collate::modes::components::ComponentReports;
use vigil_collate::{modes, patterns, sandbox, MultiWriter};
use vigil_vulnspec::Interp;

const DEFAULT_VULNSPEC_DIR: &str = "/usr/local/share/vulnspec";

/// At most this many files per stream.
const MAX_INOUTS: usize = 8;
/// At most this many opened files in total.
const MAX_FOPENS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Banners,
    Httpmsgs,
    Matches,
    Components,
    Cves,
}

#[derive(Parser, Debug)]
#[command(name = "vigil-collate", about = "Collate scan output into reports")]
struct Args {
    /// Collation type.
    #[arg(short = 't', long = "type", value_enum)]
    mode: Mode,

    /// Banner input (JSONL).
    #[arg(short = 'B', long = "in-banners")]
    in_banners: Vec<PathBuf>,

    /// Services CSV input.
    #[arg(short = 'S', long = "in-services-csv")]
    in_services_csv: Vec<PathBuf>,

    /// Component/service CSV input.
    #[arg(short = 'I', long = "in-compsvc-csv")]
    in_compsvc_csv: Vec<PathBuf>,

    /// Components CSV input.
    #[arg(short = 'O', long = "in-components-csv")]
    in_components_csv: Vec<PathBuf>,

    /// Services CSV output.
    #[arg(short = 's', long = "out-services-csv")]
    out_services_csv: Vec<PathBuf>,

    /// Service/certificate CSV output.
    #[arg(short = 'e', long = "out-svccert-csv")]
    out_svccert_csv: Vec<PathBuf>,

    /// Certificate CSV output.
    #[arg(short = 'c', long = "out-certs-csv")]
    out_certs_csv: Vec<PathBuf>,

    /// Certificate SANs CSV output.
    #[arg(short = 'a', long = "out-cert-sans-csv")]
    out_cert_sans_csv: Vec<PathBuf>,

    /// HTTP message output (JSONL).
    #[arg(short = 'm', long = "out-httpmsgs")]
    out_httpmsgs: Vec<PathBuf>,

    /// Component matches by service output.
    #[arg(short = 'i', long = "out-compsvc-csv")]
    out_compsvc_csv: Vec<PathBuf>,

    /// Components CSV output.
    #[arg(short = 'o', long = "out-components-csv")]
    out_components_csv: Vec<PathBuf>,

    /// Component id to service id CSV output.
    #[arg(short = 'p', long = "out-compidsvcid-csv")]
    out_compidsvcid_csv: Vec<PathBuf>,

    /// CVE CSV output.
    #[arg(short = 'v', long = "out-cves-csv")]
    out_cves_csv: Vec<PathBuf>,

    /// Vulnspec name, resolved under $VULNSPEC_DIR.
    #[arg(short = 'V', long = "vulnspec")]
    vulnspec: Option<String>,

    /// Pattern table CSV (`type,name,pattern`); the built-in table is
    /// used when absent.
    #[arg(short = 'P', long = "patterns")]
    patterns: Option<PathBuf>,

    /// Disable the sandbox (debugging only).
    #[arg(short = 'X', long = "no-sandbox")]
    no_sandbox: bool,
}

/// Tracks the total open count across all streams.
#[derive(Default)]
struct Opener {
    nopen: usize,
}

impl Opener {
    fn inputs(&mut self, paths: &[PathBuf]) -> Result<Vec<Box<dyn BufRead>>> {
        self.check(paths)?;
        let mut files: Vec<Box<dyn BufRead>> = Vec::new();
        for path in paths {
            let file =
                File::open(path).with_context(|| format!("open {}", path.display()))?;
            files.push(Box::new(BufReader::new(file)));
        }
        Ok(files)
    }

    fn outputs(&mut self, paths: &[PathBuf], header: Option<&str>) -> Result<MultiWriter> {
        self.check(paths)?;
        let mut out = MultiWriter::new();
        for path in paths {
            let file =
                File::create(path).with_context(|| format!("create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            if let Some(header) = header {
                writer
                    .write_all(header.as_bytes())
                    .with_context(|| format!("write header to {}", path.display()))?;
            }
            out.push(Box::new(writer));
        }
        Ok(out)
    }

    fn check(&mut self, paths: &[PathBuf]) -> Result<()> {
        if paths.len() > MAX_INOUTS {
            bail!("too many files for one stream (max {MAX_INOUTS})");
        }
        self.nopen += paths.len();
        if self.nopen > MAX_FOPENS {
            bail!("too many open files (max {MAX_FOPENS})");
        }
        Ok(())
    }
}

fn open_vulnspec(name: &str) -> Result<File> {
    if name.is_empty() || name.contains('/') {
        bail!("invalid vulnspec name");
    }

    let dir = std::env::var("VULNSPEC_DIR")
        .ok()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_VULNSPEC_DIR.to_string());
    let path = PathBuf::from(dir).join(format!("{name}.vs"));
    File::open(&path).with_context(|| format!("open vulnspec {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vigil_collate=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut opener = Opener::default();

    // Open everything before entering the sandbox; nothing below this
    // block may create descriptors.
    let vulnspec_file = args
        .vulnspec
        .as_deref()
        .map(open_vulnspec)
        .transpose()?;

    let pattern_file = args
        .patterns
        .as_deref()
        .map(|p| File::open(p).with_context(|| format!("open patterns {}", p.display())))
        .transpose()?;

    let mut in_banners = opener.inputs(&args.in_banners)?;
    let mut in_services = opener.inputs(&args.in_services_csv)?;
    let mut in_compsvc = opener.inputs(&args.in_compsvc_csv)?;
    let mut in_components = opener.inputs(&args.in_components_csv)?;

    let mut banner_reports = BannerReports {
        services: opener.outputs(
            &args.out_services_csv,
            Some("Service ID,Name,Address,Transport,Port,Service\r\n"),
        )?,
        svccert: opener.outputs(
            &args.out_svccert_csv,
            Some("Service ID,Certificate Chain\r\n"),
        )?,
        certs: opener.outputs(
            &args.out_certs_csv,
            Some("Chain,Depth,Subject,Issuer,Not Valid Before,Not Valid After\r\n"),
        )?,
        cert_sans: opener.outputs(&args.out_cert_sans_csv, Some("Chain,Depth,Type,Name\r\n"))?,
    };
    let mut out_httpmsgs = opener.outputs(&args.out_httpmsgs, None)?;
    let mut out_compsvc = opener.outputs(
        &args.out_compsvc_csv,
        Some("Component,Version,Service ID\r\n"),
    )?;
    let mut component_reports = ComponentReports {
        components: opener.outputs(
            &args.out_components_csv,
            Some("Component ID,Name,Version\r\n"),
        )?,
        compidsvcid: opener.outputs(&args.out_compidsvcid_csv, Some("Component ID,Service ID\r\n"))?,
    };
    let mut out_cves = opener.outputs(
        &args.out_cves_csv,
        Some("Component ID,CVE-ID,CVSSv2 Base Score,CVSSv3 Base Score,Description\r\n"),
    )?;

    if args.no_sandbox {
        warn!("sandbox disabled");
    } else {
        sandbox::enter().context("enter sandbox")?;
    }

    // Mapping the image is allowed under the sandbox; creating the
    // descriptor was not, which is why the file is opened above.
    let mut interp = Interp::new();
    if let Some(file) = &vulnspec_file {
        interp
            .load_file(file)
            .context("load vulnspec image")?;
    }

    match args.mode {
        Mode::Banners => modes::banners::run(&mut in_banners, &mut banner_reports)?,
        Mode::Httpmsgs => modes::httpmsgs::run(&mut in_services, &mut out_httpmsgs)?,
        Mode::Matches => {
            let mut matcher = match pattern_file {
                Some(file) => {
                    let mut matcher = vigil_matcher::Matcher::new();
                    patterns::load_pattern_csv(&mut matcher, &mut BufReader::new(file))
                        .context("load pattern table")?;
                    matcher
                }
                None => patterns::builtin_matcher().context("compile pattern table")?,
            };
            modes::matches::run(&mut matcher, &mut in_banners, &mut in_services, &mut out_compsvc)?
        }
        Mode::Components => modes::components::run(&mut in_compsvc, &mut component_reports)?,
        Mode::Cves => modes::cves::run(&mut interp, &mut in_components, &mut out_cves)?,
    }

    Ok(())
}

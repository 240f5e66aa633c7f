use std::fs;
use std::path::{Path, PathBuf};

use std::cmp::Reverse;

use anyhow::{bail, Context};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::cable::{Cable, CableAttenuationCurve};
use crate::pattern::{AngularSample, CutType, ElementalPattern, Normalization};
use crate::physics::array_factor::ArrayGeometry;
use crate::physics::erp::{GainTable, LossBreakdown};
use crate::units::FrequencyUnit;

fn parse_number(token: &str) -> Option<f64> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    token.replace(',', ".").parse::<f64>().ok()
}

/// Picks the field separator from the first data lines.
fn sniff_delimiter(text: &str) -> Option<u8> {
    let sample: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .take(20)
        .collect();
    let all_have = |c: char| !sample.is_empty() && sample.iter().all(|l| l.contains(c));
    if all_have(';') {
        Some(b';')
    } else if all_have('\t') {
        Some(b'\t')
    } else if all_have(',') && !splits_on_whitespace(&sample) {
        Some(b',')
    } else {
        None
    }
}

/// True when every line with a numeric token already yields two or more
/// numbers split on whitespace, i.e. commas there are decimal marks.
fn splits_on_whitespace(lines: &[&str]) -> bool {
    let counts: Vec<usize> = lines
        .iter()
        .map(|l| l.split_whitespace().filter_map(parse_number).count())
        .filter(|&n| n > 0)
        .collect();
    !counts.is_empty() && counts.iter().all(|&n| n >= 2)
}

/// Rounded phi key, 1e-4 deg resolution.
fn phi_key(phi: f64) -> i64 {
    (phi * 1e4).round() as i64
}

/// Keeps the rows of the most populated phi cut. Ties go to the cut closest
/// to phi = 0, then to the positive one.
fn primary_phi_cut(rows: Vec<[f64; 3]>) -> Vec<[f64; 3]> {
    let counts = rows.iter().map(|r| phi_key(r[0])).counts();
    if counts.len() <= 1 {
        return rows;
    }
    let Some((best, _)) = counts
        .into_iter()
        .max_by_key(|&(key, n)| (n, Reverse(key.abs()), key))
    else {
        return rows;
    };
    let best = best as f64 / 1e4;
    rows.into_iter().filter(|r| (r[0] - best).abs() <= 1e-3).collect()
}

/// Parses a two- or three-column pattern table.
///
/// Separators may be `;`, tab, `,` or runs of whitespace. Decimal commas are
/// accepted when the separator is not a comma. Lines starting with `#` and
/// a leading header row are skipped. Rows with two numbers are
/// `(angle, amplitude)`; rows with three or more are `(phi, theta, value)`
/// exports and use the theta and value columns. When such an export holds
/// several phi cuts only the most populated one is kept.
pub fn parse_pattern_text(text: &str, cut: CutType) -> anyhow::Result<ElementalPattern> {
    let (delimiter, body) = match sniff_delimiter(text) {
        Some(d) => (d, text.to_string()),
        None => (
            b'\t',
            text.lines()
                .map(|l| l.split_whitespace().collect::<Vec<_>>().join("\t"))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut samples = Vec::new();
    let mut cuts = Vec::new();
    let mut first_row = true;
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed pattern row {}", line + 1))?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        if first_row {
            first_row = false;
            if record.iter().any(|f| !f.is_empty() && parse_number(f).is_none()) {
                continue;
            }
        }
        let numbers: Vec<f64> = record.iter().filter_map(parse_number).collect();
        match numbers.as_slice() {
            [angle, amplitude] => samples.push(AngularSample::new(*angle, *amplitude)),
            [phi, theta, value, ..] => cuts.push([*phi, *theta, *value]),
            _ => {}
        }
    }
    samples.extend(
        primary_phi_cut(cuts)
            .into_iter()
            .map(|[_, theta, value]| AngularSample::new(theta, value)),
    );

    if samples.is_empty() {
        bail!("no numeric (angle, amplitude) rows found in pattern text");
    }
    let pattern = ElementalPattern::new(cut, samples);
    if pattern.is_empty() {
        bail!("every pattern row held a non-finite value");
    }
    Ok(pattern)
}

pub fn load_pattern_file(path: &Path, cut: CutType) -> anyhow::Result<ElementalPattern> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read pattern file {}", path.display()))?;
    parse_pattern_text(&text, cut).with_context(|| format!("failed to parse {}", path.display()))
}

fn default_normalization() -> Normalization {
    Normalization::Max
}

/// Where a project's elemental pattern comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSource {
    Inline {
        samples: Vec<(f64, f64)>,
        #[serde(default = "default_normalization")]
        normalization: Normalization,
    },
    File {
        /// Relative paths resolve against the project file's directory.
        path: PathBuf,
        #[serde(default = "default_normalization")]
        normalization: Normalization,
    },
}

impl PatternSource {
    pub fn load(&self, cut: CutType, base_dir: &Path) -> anyhow::Result<ElementalPattern> {
        match self {
            PatternSource::Inline {
                samples,
                normalization,
            } => Ok(ElementalPattern::new(cut, samples.iter().map(|&s| s.into()))
                .with_normalization(*normalization)),
            PatternSource::File { path, normalization } => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    base_dir.join(path)
                };
                Ok(load_pattern_file(&path, cut)?.with_normalization(*normalization))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feeder {
    pub cable: Cable,
    pub length_m: f64,
    #[serde(default)]
    pub connectors_db: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerOptions {
    pub horizontal_step_deg: f64,
    pub vertical_step_deg: f64,
}

impl Default for ComposerOptions {
    fn default() -> Self {
        Self {
            horizontal_step_deg: 1.0,
            vertical_step_deg: 1.0,
        }
    }
}

/// Project file as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    pub name: String,
    pub frequency: f64,
    #[serde(default)]
    pub frequency_unit: FrequencyUnit,
    pub tx_power_w: f64,
    #[serde(default)]
    pub nominal_gain_db: f64,
    #[serde(default)]
    pub hrp: Option<PatternSource>,
    #[serde(default)]
    pub vrp: Option<PatternSource>,
    #[serde(default)]
    pub horizontal: ArrayGeometry,
    #[serde(default)]
    pub vertical: ArrayGeometry,
    #[serde(default)]
    pub feeder: Option<Feeder>,
    #[serde(default)]
    pub losses: LossBreakdown,
    #[serde(default)]
    pub calibration: Option<GainTable>,
    #[serde(default)]
    pub options: ComposerOptions,
}

/// A project with its patterns loaded, ready for composition.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub name: String,
    pub frequency_mhz: f64,
    pub tx_power_w: f64,
    pub nominal_gain_db: f64,
    /// `None` composes with an omnidirectional element.
    pub hrp: Option<ElementalPattern>,
    pub vrp: Option<ElementalPattern>,
    pub horizontal: ArrayGeometry,
    pub vertical: ArrayGeometry,
    pub feeder: Option<Feeder>,
    pub losses: LossBreakdown,
    pub calibration: Option<GainTable>,
    pub options: ComposerOptions,
}

impl Project {
    pub fn new(name: impl Into<String>, frequency_mhz: f64, tx_power_w: f64) -> Self {
        Self {
            name: name.into(),
            frequency_mhz,
            tx_power_w,
            nominal_gain_db: 0.0,
            hrp: None,
            vrp: None,
            horizontal: ArrayGeometry::default(),
            vertical: ArrayGeometry::default(),
            feeder: None,
            losses: LossBreakdown::default(),
            calibration: None,
            options: ComposerOptions::default(),
        }
    }

    pub fn from_file(file: ProjectFile, base_dir: &Path) -> anyhow::Result<Self> {
        let hrp = file
            .hrp
            .as_ref()
            .map(|s| s.load(CutType::Hrp, base_dir))
            .transpose()
            .context("failed to load HRP")?;
        let vrp = file
            .vrp
            .as_ref()
            .map(|s| s.load(CutType::Vrp, base_dir))
            .transpose()
            .context("failed to load VRP")?;
        Ok(Self {
            name: file.name,
            frequency_mhz: file.frequency_unit.to_mhz(file.frequency),
            tx_power_w: file.tx_power_w,
            nominal_gain_db: file.nominal_gain_db,
            hrp,
            vrp,
            horizontal: file.horizontal,
            vertical: file.vertical,
            feeder: file.feeder,
            losses: file.losses,
            calibration: file.calibration,
            options: file.options,
        })
    }
}

pub fn load_project_from_json(path: &Path) -> anyhow::Result<Project> {
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open project {}", path.display()))?;
    let reader = std::io::BufReader::new(file);
    let project: ProjectFile = serde_json::from_reader(reader)
        .with_context(|| format!("invalid project file {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    Project::from_file(project, base_dir)
}

pub fn load_cable_from_json(path: &Path) -> anyhow::Result<Cable> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read cable file {}", path.display()))?;
    // a bare curve is accepted as an unnamed cable
    if let Ok(cable) = serde_json::from_str::<Cable>(&text) {
        return Ok(cable);
    }
    let curve: CableAttenuationCurve = serde_json::from_str(&text)
        .with_context(|| format!("{} is neither a cable nor an attenuation curve", path.display()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Cable {
        name,
        impedance_ohms: None,
        velocity_factor: None,
        curve,
    })
}

pub fn write_json<T: Serialize>(value: &T, path: &Path) -> anyhow::Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

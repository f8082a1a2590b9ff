//! The library of reference waveforms, and their phase-shifted desamplings.
//!
//! Templates are simulated at `sim_sampling_rate`, which is an integer multiple
//! (the desampling factor) of the ADC's `adc_sampling_rate`. For each template,
//! the library stores one sub-sampled waveform per phase. For instance, templates of
//! 400 samples simulated at 2000 MHz and an ADC at 500 MHz have a desampling factor of 4,
//! so each template yields 4 desampled templates of 100 samples.
use super::{
    Real,
    error::{ConfigError, LibraryError, LoadError, StateError},
};
use flt_common::SampleRate;
use itertools::Itertools;
use serde::Serialize;
use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::Path,
};
use tracing::{info, instrument};

/// A single waveform, its sample rate is determined by context.
pub type Template = Vec<Real>;

/// The ADC and simulation sampling rates, in MHz.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SamplingRates {
    adc: SampleRate,
    sim: SampleRate,
}

impl SamplingRates {
    pub fn new(adc: SampleRate, sim: SampleRate) -> Result<Self, ConfigError> {
        if adc == 0 {
            return Err(ConfigError::ZeroAdcSamplingRate);
        }
        if sim < adc {
            return Err(ConfigError::SimulationRateBelowAdcRate { adc, sim });
        }
        Ok(Self { adc, sim })
    }

    pub fn adc(&self) -> SampleRate {
        self.adc
    }

    pub fn sim(&self) -> SampleRate {
        self.sim
    }

    /// The simulation rate divided by the ADC rate, rounded down.
    pub fn desampling_factor(&self) -> usize {
        (self.sim / self.adc) as usize
    }
}

impl Default for SamplingRates {
    fn default() -> Self {
        Self {
            adc: 500,
            sim: 2000,
        }
    }
}

/// The number of samples in each raw template, and the sample at which the signal peaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TemplateGeometry {
    size_template: usize,
    sample_peak_template: usize,
}

impl TemplateGeometry {
    pub fn new(size_template: usize, sample_peak_template: usize) -> Result<Self, ConfigError> {
        if size_template == 0 {
            return Err(ConfigError::ZeroTemplateSize);
        }
        if sample_peak_template >= size_template {
            return Err(ConfigError::PeakOutsideTemplate {
                peak: sample_peak_template,
                size: size_template,
            });
        }
        Ok(Self {
            size_template,
            sample_peak_template,
        })
    }

    pub fn size_template(&self) -> usize {
        self.size_template
    }

    pub fn sample_peak_template(&self) -> usize {
        self.sample_peak_template
    }

    fn check_desampling_factor(&self, factor: usize) -> Result<(), ConfigError> {
        if factor < 1 {
            return Err(ConfigError::DesamplingFactor(factor));
        }
        if self.size_template < factor {
            return Err(ConfigError::TemplateShorterThanDesamplingFactor {
                size: self.size_template,
                factor,
            });
        }
        if self.sample_peak_template / factor >= self.size_template / factor {
            return Err(ConfigError::PeakOutsideDesampledTemplate {
                peak: self.sample_peak_template,
                size: self.size_template,
                factor,
            });
        }
        Ok(())
    }
}

impl Default for TemplateGeometry {
    fn default() -> Self {
        Self {
            size_template: 400,
            sample_peak_template: 120,
        }
    }
}

/// Owns the raw templates and their desamplings.
///
/// The desampled templates are regenerated whenever the raw templates or the sampling
/// rates change, and every regeneration advances [TemplateLibrary::generation].
#[derive(Clone, Debug, Default)]
pub struct TemplateLibrary {
    rates: SamplingRates,
    geometry: TemplateGeometry,
    templates: Vec<Template>,
    templates_desampled: Vec<Vec<Template>>,
    generation: u64,
}

impl TemplateLibrary {
    /// Creates an empty library.
    pub fn new(rates: SamplingRates) -> Self {
        Self {
            rates,
            ..Default::default()
        }
    }

    /// Loads templates from a text file, then desamples them.
    /// See [TemplateLibrary::load_from_reader] for the format.
    pub fn load(&mut self, path: &Path, geometry: TemplateGeometry) -> Result<(), LibraryError> {
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_owned(),
            source,
        })?;
        self.load_from_reader(BufReader::new(file), geometry)
    }

    /// Loads templates from a text source, then desamples them.
    ///
    /// Each line holds one template of `size_template` whitespace-separated values.
    /// Lines starting with `#`, and blank lines, are skipped.
    /// On failure the library is left unchanged.
    #[instrument(skip_all, level = "debug", err(level = "warn"))]
    pub fn load_from_reader<R: BufRead>(
        &mut self,
        reader: R,
        geometry: TemplateGeometry,
    ) -> Result<(), LibraryError> {
        let factor = self.rates.desampling_factor();
        geometry.check_desampling_factor(factor)?;

        let templates = read_templates(reader, geometry.size_template())?;
        info!(
            "Loaded {} templates of {} samples",
            templates.len(),
            geometry.size_template()
        );
        let templates_desampled = desample_templates(&templates, &geometry, factor)?;

        self.geometry = geometry;
        self.templates = templates;
        self.commit_desampled(templates_desampled);
        Ok(())
    }

    /// Regenerates the desampled templates from the raw templates.
    pub fn desample(&mut self) -> Result<(), LibraryError> {
        let templates_desampled = desample_templates(
            &self.templates,
            &self.geometry,
            self.rates.desampling_factor(),
        )?;
        self.commit_desampled(templates_desampled);
        Ok(())
    }

    /// Changes the sampling rates. If templates are loaded they are desampled again,
    /// on failure the library is left unchanged.
    pub fn set_sampling_rates(&mut self, rates: SamplingRates) -> Result<(), LibraryError> {
        if !self.templates.is_empty() {
            let templates_desampled =
                desample_templates(&self.templates, &self.geometry, rates.desampling_factor())?;
            self.rates = rates;
            self.commit_desampled(templates_desampled);
        } else {
            self.rates = rates;
        }
        Ok(())
    }

    fn commit_desampled(&mut self, templates_desampled: Vec<Vec<Template>>) {
        self.templates_desampled = templates_desampled;
        self.generation += 1;
        info!(
            "Split each template of {} samples at simulated sampling rate of {} MHz into {} desampled templates of {} samples at ADC sampling rate of {} MHz",
            self.geometry.size_template(),
            self.rates.sim(),
            self.desampling_factor(),
            self.size_template_desampled(),
            self.rates.adc()
        );
    }

    pub fn sampling_rates(&self) -> SamplingRates {
        self.rates
    }

    pub fn adc_sampling_rate(&self) -> SampleRate {
        self.rates.adc()
    }

    pub fn sim_sampling_rate(&self) -> SampleRate {
        self.rates.sim()
    }

    pub fn desampling_factor(&self) -> usize {
        self.rates.desampling_factor()
    }

    pub fn geometry(&self) -> TemplateGeometry {
        self.geometry
    }

    pub fn size_template(&self) -> usize {
        self.geometry.size_template()
    }

    pub fn size_template_desampled(&self) -> usize {
        self.geometry.size_template() / self.desampling_factor()
    }

    pub fn sample_peak_template(&self) -> usize {
        self.geometry.sample_peak_template()
    }

    pub fn sample_peak_template_desampled(&self) -> usize {
        self.geometry.sample_peak_template() / self.desampling_factor()
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Indexed first by template, then by phase.
    pub fn templates_desampled(&self) -> &[Vec<Template>] {
        &self.templates_desampled
    }

    pub fn num_templates(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Advances each time the desampled templates are regenerated.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Parses templates from a text source, one per line.
fn read_templates<R: BufRead>(reader: R, size_template: usize) -> Result<Vec<Template>, LoadError> {
    let mut templates = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let record = line.trim();
        if record.is_empty() || record.starts_with('#') {
            continue;
        }
        let template = record
            .split_whitespace()
            .map(|value| {
                let parsed = value.parse::<Real>().map_err(|source| LoadError::Parse {
                    line: index + 1,
                    value: value.to_owned(),
                    source,
                })?;
                if parsed.is_finite() {
                    Ok(parsed)
                } else {
                    Err(LoadError::NonFiniteValue {
                        line: index + 1,
                        value: value.to_owned(),
                    })
                }
            })
            .collect::<Result<Template, _>>()?;
        if template.len() != size_template {
            return Err(LoadError::RecordLength {
                line: index + 1,
                found: template.len(),
                expected: size_template,
            });
        }
        templates.push(template);
    }
    Ok(templates)
}

/// For every template, and every phase `j` in `0..factor`, takes every `factor`-th sample
/// starting at `j`. All phases are truncated to `size_template / factor` samples.
fn desample_templates(
    templates: &[Template],
    geometry: &TemplateGeometry,
    factor: usize,
) -> Result<Vec<Vec<Template>>, LibraryError> {
    geometry.check_desampling_factor(factor)?;
    if templates.is_empty() {
        return Err(StateError::NoTemplatesLoaded.into());
    }
    let size_template_desampled = geometry.size_template() / factor;

    Ok(templates
        .iter()
        .map(|template| {
            (0..factor)
                .map(|phase| {
                    template
                        .iter()
                        .skip(phase)
                        .step_by(factor)
                        .take(size_template_desampled)
                        .copied()
                        .collect()
                })
                .collect()
        })
        .collect())
}

/// Writes templates in the format read by [TemplateLibrary::load_from_reader].
/// # Parameters
/// - writer: the destination.
/// - header: if given, written first as a `#` comment line.
/// - templates: the templates to write, one per line.
pub fn write_templates<W: Write>(
    writer: &mut W,
    header: Option<&str>,
    templates: &[Template],
) -> std::io::Result<()> {
    if let Some(header) = header {
        writeln!(writer, "# {header}")?;
    }
    for template in templates {
        let line = template.iter().join(" ");
        writeln!(writer, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TEMPLATE_SOURCE: &str = "# two templates of eight samples
0 1 2 3 4 5 6 7
  # indented comment

10 11 12 13 14 15 16 17
";

    fn load(source: &str, factor: SampleRate, size: usize) -> Result<TemplateLibrary, LibraryError> {
        let mut library = TemplateLibrary::new(SamplingRates::new(100, 100 * factor).unwrap());
        library.load_from_reader(Cursor::new(source), TemplateGeometry::new(size, 5).unwrap())?;
        Ok(library)
    }

    #[test]
    fn sampling_rates_validation() {
        assert_eq!(
            SamplingRates::new(2000, 500),
            Err(ConfigError::SimulationRateBelowAdcRate {
                adc: 2000,
                sim: 500
            })
        );
        assert_eq!(
            SamplingRates::new(0, 500),
            Err(ConfigError::ZeroAdcSamplingRate)
        );
        assert_eq!(SamplingRates::new(500, 2000).unwrap().desampling_factor(), 4);
        assert_eq!(SamplingRates::new(500, 1999).unwrap().desampling_factor(), 3);
        assert_eq!(SamplingRates::default().desampling_factor(), 4);
    }

    #[test]
    fn geometry_validation() {
        assert_eq!(
            TemplateGeometry::new(400, 400),
            Err(ConfigError::PeakOutsideTemplate {
                peak: 400,
                size: 400
            })
        );
        assert_eq!(TemplateGeometry::new(0, 0), Err(ConfigError::ZeroTemplateSize));
        assert_eq!(
            TemplateGeometry::default(),
            TemplateGeometry::new(400, 120).unwrap()
        );
    }

    #[test]
    fn load_skips_comments_and_blank_lines() {
        let library = load(TEMPLATE_SOURCE, 4, 8).unwrap();
        assert_eq!(library.num_templates(), 2);
        assert_eq!(library.templates()[1][0], 10.0);
        assert_eq!(library.size_template_desampled(), 2);
        assert_eq!(library.sample_peak_template_desampled(), 1);
        assert_eq!(library.generation(), 1);
    }

    #[test]
    fn desampled_phases() {
        let library = load(TEMPLATE_SOURCE, 4, 8).unwrap();
        let phases = &library.templates_desampled()[0];
        assert_eq!(phases.len(), 4);
        assert_eq!(phases[0], vec![0.0, 4.0]);
        assert_eq!(phases[1], vec![1.0, 5.0]);
        assert_eq!(phases[3], vec![3.0, 7.0]);
    }

    #[test]
    fn phases_share_length_when_factor_does_not_divide_size() {
        let library = load(TEMPLATE_SOURCE, 3, 8).unwrap();
        assert_eq!(library.size_template_desampled(), 2);
        for phases in library.templates_desampled() {
            assert_eq!(phases.len(), 3);
            assert!(phases.iter().all(|phase| phase.len() == 2));
        }
        assert!(library.size_template_desampled() * library.desampling_factor() <= 8);
    }

    #[test]
    fn interleaved_phases_reconstruct_raw_prefix() {
        let library = load(TEMPLATE_SOURCE, 3, 8).unwrap();
        let factor = library.desampling_factor();
        for (raw, phases) in library.templates().iter().zip(library.templates_desampled()) {
            let reconstructed: Vec<Real> = (0..library.size_template_desampled())
                .flat_map(|k| phases.iter().map(move |phase| phase[k]))
                .collect();
            assert_eq!(reconstructed.len(), library.size_template_desampled() * factor);
            assert_eq!(reconstructed, raw[..reconstructed.len()]);
        }
    }

    #[test]
    fn short_record_is_an_error() {
        let result = load("0 1 2 3 4 5 6\n", 4, 8);
        assert!(matches!(
            result,
            Err(LibraryError::Load(LoadError::RecordLength {
                line: 1,
                found: 7,
                expected: 8
            }))
        ));
    }

    #[test]
    fn long_record_is_an_error() {
        let result = load("# header\n0 1 2 3 4 5 6 7 8\n", 4, 8);
        assert!(matches!(
            result,
            Err(LibraryError::Load(LoadError::RecordLength { line: 2, .. }))
        ));
    }

    #[test]
    fn unparsable_value_is_an_error() {
        let result = load("0 1 2 x 4 5 6 7\n", 4, 8);
        assert!(matches!(
            result,
            Err(LibraryError::Load(LoadError::Parse { line: 1, ref value, .. })) if value == "x"
        ));
    }

    #[test]
    fn non_finite_value_is_an_error() {
        for value in ["NaN", "inf", "-inf"] {
            let result = load(&format!("0 1 2 {value} 4 5 6 7\n"), 4, 8);
            assert!(matches!(
                result,
                Err(LibraryError::Load(LoadError::NonFiniteValue { line: 1, value: ref found }))
                    if found == value
            ));
        }
    }

    #[test]
    fn peak_beyond_desampled_template_is_a_config_error() {
        let mut library = TemplateLibrary::new(SamplingRates::new(500, 2000).unwrap());
        let result = library.load_from_reader(
            Cursor::new("1 2 3 4 5 6 7 8 9\n"),
            TemplateGeometry::new(9, 8).unwrap(),
        );
        assert!(matches!(
            result,
            Err(LibraryError::Config(ConfigError::PeakOutsideDesampledTemplate {
                peak: 8,
                size: 9,
                factor: 4
            }))
        ));
        assert!(library.is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut library = TemplateLibrary::default();
        let result = library.load(
            Path::new("no/such/template/file.txt"),
            TemplateGeometry::default(),
        );
        assert!(matches!(
            result,
            Err(LibraryError::Load(LoadError::Open { .. }))
        ));
    }

    #[test]
    fn empty_source_is_a_state_error() {
        let result = load("# nothing here\n", 4, 8);
        assert!(matches!(
            result,
            Err(LibraryError::State(StateError::NoTemplatesLoaded))
        ));
    }

    #[test]
    fn desample_before_load_is_a_state_error() {
        let mut library = TemplateLibrary::default();
        assert!(matches!(
            library.desample(),
            Err(LibraryError::State(StateError::NoTemplatesLoaded))
        ));
        assert_eq!(library.generation(), 0);
    }

    #[test]
    fn template_shorter_than_factor_is_a_config_error() {
        let mut library = TemplateLibrary::new(SamplingRates::new(100, 1000).unwrap());
        let result =
            library.load_from_reader(Cursor::new("1 2 3\n"), TemplateGeometry::new(3, 1).unwrap());
        assert!(matches!(
            result,
            Err(LibraryError::Config(
                ConfigError::TemplateShorterThanDesamplingFactor { size: 3, factor: 10 }
            ))
        ));
    }

    #[test]
    fn failed_reload_leaves_library_unchanged() {
        let mut library = load(TEMPLATE_SOURCE, 4, 8).unwrap();
        let result = library.load_from_reader(
            Cursor::new("1 2 3\n"),
            TemplateGeometry::new(8, 5).unwrap(),
        );
        assert!(result.is_err());
        assert_eq!(library.num_templates(), 2);
        assert_eq!(library.generation(), 1);
    }

    #[test]
    fn changing_rates_desamples_again() {
        let mut library = load(TEMPLATE_SOURCE, 4, 8).unwrap();
        library
            .set_sampling_rates(SamplingRates::new(100, 200).unwrap())
            .unwrap();
        assert_eq!(library.desampling_factor(), 2);
        assert_eq!(library.generation(), 2);
        assert_eq!(library.templates_desampled()[1][1], vec![11.0, 13.0, 15.0, 17.0]);
    }

    #[test]
    fn written_templates_load_identically() {
        let library = load(TEMPLATE_SOURCE, 4, 8).unwrap();
        let mut buffer = Vec::new();
        write_templates(&mut buffer, Some("round trip"), library.templates()).unwrap();

        let reloaded = load(std::str::from_utf8(&buffer).unwrap(), 4, 8).unwrap();
        assert_eq!(reloaded.templates(), library.templates());
    }

    #[test]
    fn fractional_values_survive_writing() {
        let templates = vec![vec![0.125, -3.5e-7, 1.0e12, 42.0]];
        let mut buffer = Vec::new();
        write_templates(&mut buffer, None, &templates).unwrap();
        let written = String::from_utf8(buffer).unwrap();
        let values = written
            .split_whitespace()
            .map(|value| value.parse::<Real>().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(values, templates[0]);
    }
}

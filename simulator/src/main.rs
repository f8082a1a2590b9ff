//! # Simulator
//!
//! Generates the input files of the template trigger, so it can be exercised without detector data.
//! * `templates` samples a JSON library of analytic pulse shapes into a template file.
//! * `trace` embeds one desampled template from a template file into a noisy trace file.
mod noise;
mod pulses;
mod trace;

use clap::{Args, Parser, Subcommand};
use flt_common::{SampleRate, init_tracer};
use miette::IntoDiagnostic;
use noise::Noise;
use pulses::{Pulse, PulseLibrary};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};
use template_trigger::{
    template_matching::{Real, SamplingRates, TemplateGeometry, TemplateLibrary, write_templates},
    trace_file::write_trace,
};
use trace::{Placement, select_phase, simulate_trace};
use tracing::info;

#[derive(Debug, Parser)]
#[clap(author, version = flt_common::version!(), about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Write a template file from a JSON file of pulse shapes
    Templates(Templates),

    /// Write a trace file containing one desampled template
    Trace(Trace),
}

#[derive(Debug, Args)]
struct Templates {
    /// JSON file of pulse shapes, with times in samples at the simulated sampling rate
    #[clap(long)]
    pulse_file: PathBuf,

    /// Number of samples in each template
    #[clap(long, default_value = "400")]
    size_template: usize,

    /// File to write the templates to
    #[clap(long)]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct Trace {
    /// File of templates, one per line, at the simulated sampling rate
    #[clap(long)]
    template_file: PathBuf,

    /// Sampling rate of the ADC, in MHz
    #[clap(long, default_value = "500")]
    adc_sampling_rate: SampleRate,

    /// Sampling rate at which the templates were simulated, in MHz
    #[clap(long, default_value = "2000")]
    sim_sampling_rate: SampleRate,

    /// Number of samples in each template, at the simulated sampling rate
    #[clap(long, default_value = "400")]
    size_template: usize,

    /// Sample at which each template peaks, at the simulated sampling rate
    #[clap(long, default_value = "120")]
    sample_peak_template: usize,

    /// Index of the template to embed
    #[clap(long, default_value = "0")]
    template_index: usize,

    /// Phase of the desampled template to embed
    #[clap(long, default_value = "0")]
    phase: usize,

    /// Number of samples in the trace
    #[clap(long, default_value = "1024")]
    trace_length: usize,

    /// Trace sample at which the embedded template peaks
    #[clap(long, default_value = "512")]
    peak: usize,

    /// Scale applied to the template
    #[clap(long, default_value = "1000")]
    amplitude: Real,

    /// Value of the trace baseline
    #[clap(long, default_value = "0", allow_hyphen_values = true)]
    baseline: Real,

    /// Mean of the Gaussian noise
    #[clap(long, default_value = "0", allow_hyphen_values = true)]
    noise_mean: Real,

    /// Standard deviation of the Gaussian noise, no noise is added if it and the mean are zero
    #[clap(long, default_value = "0")]
    noise_sd: Real,

    /// Length of the moving average window applied to the noise
    #[clap(long, default_value = "1")]
    smoothing_window_length: usize,

    /// Seed of the noise generator
    #[clap(long, default_value = "0")]
    seed: u64,

    /// Number of samples written on each line
    #[clap(long, default_value = "16")]
    values_per_line: usize,

    /// File to write the trace to
    #[clap(long)]
    output: PathBuf,
}

fn main() -> miette::Result<()> {
    let args = Cli::parse();

    let _tracer = init_tracer!().into_diagnostic()?;

    match args.mode {
        Mode::Templates(templates) => write_template_file(&templates),
        Mode::Trace(trace) => write_trace_file(&trace),
    }
}

fn write_template_file(args: &Templates) -> miette::Result<()> {
    let file = File::open(&args.pulse_file).into_diagnostic()?;
    let library: PulseLibrary = serde_json::from_reader(file).into_diagnostic()?;

    let templates = library
        .pulses
        .iter()
        .map(|shape| Pulse::new(shape).map(|pulse| pulse.template(args.size_template)))
        .collect::<Result<Vec<_>, _>>()
        .into_diagnostic()?;

    let mut writer = BufWriter::new(File::create(&args.output).into_diagnostic()?);
    let header = format!(
        "{} templates of {} samples generated from {}",
        templates.len(),
        args.size_template,
        args.pulse_file.display()
    );
    write_templates(&mut writer, Some(&header), &templates).into_diagnostic()?;
    writer.flush().into_diagnostic()?;

    info!("Wrote {} templates to {}", templates.len(), args.output.display());
    Ok(())
}

fn write_trace_file(args: &Trace) -> miette::Result<()> {
    let rates = SamplingRates::new(args.adc_sampling_rate, args.sim_sampling_rate).into_diagnostic()?;
    let geometry =
        TemplateGeometry::new(args.size_template, args.sample_peak_template).into_diagnostic()?;
    let mut library = TemplateLibrary::new(rates);
    library
        .load(&args.template_file, geometry)
        .into_diagnostic()?;

    let template = select_phase(&library, args.template_index, args.phase).into_diagnostic()?;
    let placement = Placement {
        peak: args.peak,
        amplitude: args.amplitude,
        baseline: args.baseline,
    };
    let mut noise = (args.noise_sd != 0.0 || args.noise_mean != 0.0)
        .then(|| {
            Noise::new(
                args.noise_mean,
                args.noise_sd,
                args.smoothing_window_length,
                args.seed,
            )
        })
        .transpose()
        .into_diagnostic()?;

    let trace = simulate_trace(
        args.trace_length,
        template,
        library.sample_peak_template_desampled(),
        placement,
        noise.as_mut(),
    )
    .into_diagnostic()?;

    let mut writer = BufWriter::new(File::create(&args.output).into_diagnostic()?);
    write_trace(&mut writer, &trace, args.values_per_line).into_diagnostic()?;
    writer.flush().into_diagnostic()?;

    info!(
        "Wrote trace of {} samples containing template {} phase {} peaking at sample {} to {}",
        trace.len(),
        args.template_index,
        args.phase,
        args.peak,
        args.output.display()
    );
    Ok(())
}

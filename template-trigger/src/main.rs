//! # Template Trigger
//!
//! The Template Trigger component performs the following functions:
//! * Loads a library of templates from the file specified by the user, and desamples them to the ADC rate.
//! * Reads a trace file, holding one or more channels of a trace event.
//! * Locates the maximum of each channel, and fits every desampled template around it.
//! * Reports the best fit of each channel, and whether the channel triggers.
//!
//! The fit may be repeated a number of times to benchmark it.
mod timer;

use clap::Parser;
use flt_common::{
    init_tracer,
    metrics::{
        component_info_metric,
        names::{FAILURES, LAST_CORRELATION, TRACES_PROCESSED, TRACES_TRIGGERED},
    },
};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use miette::IntoDiagnostic;
use std::{net::SocketAddr, num::NonZeroU64, path::PathBuf};
use template_trigger::{
    parameters::{PeakSearchRange, TriggerOptions},
    processing::{ChannelReport, process_traces},
    trace_file::load_traces,
};
use timer::TimerSuite;
use tracing::{info, warn};

/// [clap] derived struct to handle command line parameters.
#[derive(Debug, Parser)]
#[clap(author, version = flt_common::version!(), about)]
struct Cli {
    /// File of templates, one per line, at the simulated sampling rate
    #[clap(long, env)]
    template_file: PathBuf,

    /// File of whitespace-separated trace samples
    #[clap(long)]
    trace_file: PathBuf,

    /// If set, the trace file is split into channels of this many samples
    #[clap(long)]
    samples_per_trace: Option<usize>,

    #[clap(flatten)]
    trigger_options: TriggerOptions,

    /// If set, the trace maximum is only searched for within this range of samples, as `start,end`
    #[clap(long)]
    peak_search_range: Option<PeakSearchRange>,

    /// Number of times the fit is repeated over all channels
    #[clap(long, default_value = "1")]
    iterations: NonZeroU64,

    /// If set, each channel's result is printed as a line of JSON
    #[clap(long)]
    json: bool,

    /// If set, OpenMetrics flavour metrics are available on this endpoint
    #[clap(long, env)]
    observability_address: Option<SocketAddr>,
}

fn main() -> miette::Result<()> {
    let args = Cli::parse();

    let _tracer = init_tracer!().into_diagnostic()?;

    if let Some(observability_address) = args.observability_address {
        // Install exporter and register metrics
        PrometheusBuilder::new()
            .with_http_listener(observability_address)
            .install()
            .into_diagnostic()?;
    }

    describe_counter!(
        TRACES_PROCESSED,
        metrics::Unit::Count,
        "Number of channel traces evaluated"
    );
    describe_counter!(
        TRACES_TRIGGERED,
        metrics::Unit::Count,
        "Number of channel traces which triggered"
    );
    describe_gauge!(
        LAST_CORRELATION,
        "Best correlation of the last trace evaluated on each channel"
    );
    describe_counter!(
        FAILURES,
        metrics::Unit::Count,
        "Number of failures encountered"
    );

    component_info_metric("template-trigger");

    let template_trigger = args
        .trigger_options
        .build(&args.template_file)
        .into_diagnostic()?;
    let traces = load_traces(&args.trace_file, args.samples_per_trace).into_diagnostic()?;

    let mut timers = TimerSuite::new(args.iterations.get());
    timers.full.record();
    let mut reports = Vec::<ChannelReport>::new();
    while !timers.has_finished() {
        timers.iteration.record();
        reports = process_traces(&template_trigger, &traces, args.peak_search_range)
            .into_diagnostic()?;
        timers.iteration.end();
        if timers.next_iteration().is_none() {
            warn!("Benchmark timer overflowed");
        }
    }
    timers.full.end();
    timers.full.accumulate();

    let timing = timers.report();
    info!("{timing}");

    if args.json {
        for report in &reports {
            println!("{}", serde_json::to_string(report).into_diagnostic()?);
        }
        println!("{}", serde_json::to_string(&timing).into_diagnostic()?);
    } else {
        for report in &reports {
            print_report(report);
        }
        if args.iterations.get() > 1 {
            println!("{timing}");
        }
    }
    Ok(())
}

fn print_report(report: &ChannelReport) {
    let fit = &report.decision.fit;
    println!("*** CHANNEL {} ***", report.channel);
    println!("t_max = {}", report.t_max);
    println!("t_peak_best = {}", fit.t_peak_best);
    println!("corr_max_best = {}", fit.corr_max_best);
    println!("template_id_best = {}", fit.template_id_best);
    println!(
        "idx_template_desampled_best = {}",
        fit.idx_template_desampled_best
    );
    println!("triggered = {}", report.decision.triggered);
    println!();
}

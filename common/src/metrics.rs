//! Names and labels of the metrics published by the trigger components.
use metrics::gauge;

pub mod names {
    use const_format::concatcp;

    pub const METRIC_NAME_PREFIX: &str = "flt_";
    pub const COMPONENT_INFO: &str = concatcp!(METRIC_NAME_PREFIX, "component_info");
    pub const TRACES_PROCESSED: &str = concatcp!(METRIC_NAME_PREFIX, "traces_processed");
    pub const TRACES_TRIGGERED: &str = concatcp!(METRIC_NAME_PREFIX, "traces_triggered");
    pub const LAST_CORRELATION: &str = concatcp!(METRIC_NAME_PREFIX, "last_correlation");
    pub const FAILURES: &str = concatcp!(METRIC_NAME_PREFIX, "failures");
}

pub mod failures {
    use strum::IntoStaticStr;

    #[derive(Clone, Copy, Debug, IntoStaticStr)]
    #[strum(serialize_all = "snake_case")]
    pub enum FailureKind {
        TraceSegmentTooShort,
        EmptyTemplateLibrary,
    }

    pub fn get_label(kind: FailureKind) -> (&'static str, String) {
        let kind: &'static str = kind.into();
        ("kind", kind.to_owned())
    }
}

/// Publishes a constant gauge identifying the running component.
pub fn component_info_metric(component: &'static str) {
    gauge!(
        names::COMPONENT_INFO,
        &[("component", component.to_owned())]
    )
    .set(1.0);
}

mod reporter;

pub use reporter::MetricsReporter;

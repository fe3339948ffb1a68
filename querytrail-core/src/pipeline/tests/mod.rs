mod pipeline_tests;
mod record_sink_tests;

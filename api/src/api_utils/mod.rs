pub(crate) mod custom_extract;
pub(crate) mod latency;

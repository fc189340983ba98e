//! Component tests against fake collaborators

mod support;

mod test_changes;
mod test_http;
mod test_log_stream;
mod test_self_update;

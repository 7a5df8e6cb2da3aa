//! Building requests for resources a test declared explicitly. These take
//! precedence over inferred resources sharing the same URI (see
//! [`crate::factory::merge_dedup_by_uri`]).

use crate::collaborators::{HttpRequestDef, RequestReporter};
use crate::types::HttpRequestDescriptor;

/// Resolve and build a request for every template in `templates`,
/// reporting (not propagating) any that fail to resolve or build.
pub fn build_explicit_resources<S>(
    templates: &[Box<dyn HttpRequestDef<S>>],
    session: &S,
    reporter: &dyn RequestReporter<S>,
) -> Vec<HttpRequestDescriptor> {
    let mut built = Vec::with_capacity(templates.len());
    for template in templates {
        let name = match template.request_name(session) {
            Ok(name) => name,
            Err(message) => {
                log::error!("could not resolve explicit resource name: {message}");
                continue;
            }
        };
        match template.build(&name, session) {
            Ok(request) => built.push(request),
            Err(message) => {
                reporter.report_unbuildable_request(&name, session, &message);
            }
        }
    }
    built
}

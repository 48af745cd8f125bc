use retouch_contracts::assets::ImageAsset;
use retouch_contracts::style::FrameStyle;
use retouch_contracts::EditError;

use crate::gateway::EditGateway;

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<ImageAsset>,
    pub error: Option<EditError>,
    /// Position in the source list of the item that failed.
    pub failed_index: Option<usize>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Frames every source with the pinned style, one call at a time.
///
/// Iteration stops at the first failure; results produced before it are
/// kept. Without a pinned style or sources nothing is called.
pub fn apply_pinned_style_to_all<F>(
    gateway: &EditGateway,
    pinned: Option<&FrameStyle>,
    sources: &[ImageAsset],
    mut observe: F,
) -> BatchOutcome
where
    F: FnMut(usize, Result<&ImageAsset, &EditError>),
{
    let mut outcome = BatchOutcome::default();
    let Some(style) = pinned else {
        return outcome;
    };
    if sources.is_empty() {
        return outcome;
    }

    for (index, source) in sources.iter().enumerate() {
        match gateway.frame(source, style) {
            Ok(result) => {
                observe(index, Ok(&result));
                outcome.succeeded.push(result);
            }
            Err(err) => {
                observe(index, Err(&err));
                outcome.error = Some(err);
                outcome.failed_index = Some(index);
                break;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use retouch_contracts::style::FrameStyle;

    use super::apply_pinned_style_to_all;
    use crate::gateway::tests::{asset, ScriptedTransport};
    use crate::gateway::EditGateway;

    #[test]
    fn stops_at_first_failure_and_keeps_partial_results() {
        let transport = ScriptedTransport::default();
        transport.push_image(b"r1");
        transport.push(Err(anyhow!("boom")));
        transport.push_image(b"r3");
        let gateway = EditGateway::new(transport.clone(), "m");
        let style = FrameStyle::new("polaroid", "", "");
        let sources = vec![asset("s1.png"), asset("s2.png"), asset("s3.png")];

        let mut seen = Vec::new();
        let outcome = apply_pinned_style_to_all(&gateway, Some(&style), &sources, |idx, res| {
            seen.push((idx, res.is_ok()));
        });

        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.succeeded[0].bytes(), b"r1");
        assert_eq!(outcome.succeeded[0].name(), "framed_s1.png");
        assert!(outcome.error.is_some());
        assert_eq!(outcome.failed_index, Some(1));
        assert_eq!(transport.request_count(), 2);
        assert_eq!(seen, vec![(0, true), (1, false)]);
    }

    #[test]
    fn frames_all_sources_in_order() {
        let transport = ScriptedTransport::default();
        transport.push_image(b"r1");
        transport.push_image(b"r2");
        let gateway = EditGateway::new(transport.clone(), "m");
        let style = FrameStyle::new("gold", "Top", "Bottom");
        let sources = vec![asset("a.png"), asset("b.png")];

        let outcome = apply_pinned_style_to_all(&gateway, Some(&style), &sources, |_, _| {});
        assert!(outcome.is_complete());
        let names: Vec<&str> = outcome.succeeded.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["framed_a.png", "framed_b.png"]);
    }

    #[test]
    fn missing_style_or_sources_is_a_noop() {
        let transport = ScriptedTransport::default();
        let gateway = EditGateway::new(transport.clone(), "m");
        let style = FrameStyle::new("gold", "", "");

        let no_style = apply_pinned_style_to_all(&gateway, None, &[asset("a.png")], |_, _| {});
        assert!(no_style.succeeded.is_empty() && no_style.is_complete());

        let no_sources = apply_pinned_style_to_all(&gateway, Some(&style), &[], |_, _| {});
        assert!(no_sources.succeeded.is_empty() && no_sources.is_complete());
        assert_eq!(transport.request_count(), 0);
    }
}

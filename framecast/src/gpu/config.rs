/// Framebuffer configuration selection
use common::{ConfigHandle, GraphicsAttributes, GraphicsError};

/// A configuration offered by the GPU layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigCandidate {
    pub handle: ConfigHandle,
    pub attributes: GraphicsAttributes,
}

/// The one configuration chosen for a display. Immutable once selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsConfig {
    handle: ConfigHandle,
    attributes: GraphicsAttributes,
}

impl GraphicsConfig {
    pub fn handle(&self) -> ConfigHandle {
        self.handle
    }

    pub fn attributes(&self) -> &GraphicsAttributes {
        &self.attributes
    }
}

/// Pick the single candidate that matches `wanted` exactly.
///
/// Zero or several matches is an error; ties are never broken arbitrarily.
pub fn select_config(
    candidates: &[ConfigCandidate],
    wanted: &GraphicsAttributes,
) -> Result<GraphicsConfig, GraphicsError> {
    let mut matching = candidates
        .iter()
        .filter(|candidate| wanted.matches(&candidate.attributes));

    let Some(first) = matching.next() else {
        return Err(GraphicsError::NoMatchingConfig);
    };
    let extra = matching.count();
    if extra > 0 {
        return Err(GraphicsError::AmbiguousConfig { count: extra + 1 });
    }

    Ok(GraphicsConfig {
        handle: first.handle,
        attributes: first.attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: usize, red: u8, green: u8, blue: u8, alpha: u8) -> ConfigCandidate {
        ConfigCandidate {
            handle: ConfigHandle(id),
            attributes: GraphicsAttributes {
                red,
                green,
                blue,
                alpha,
                luminance: Some(0),
                samples: 1,
            },
        }
    }

    #[test]
    fn test_single_match_is_selected() {
        let candidates = [
            candidate(1, 5, 6, 5, 0),
            candidate(2, 8, 8, 8, 8),
            candidate(3, 8, 8, 8, 0),
        ];
        let config = select_config(&candidates, &GraphicsAttributes::default()).unwrap();
        assert_eq!(config.handle(), ConfigHandle(2));
        assert_eq!(config.attributes().alpha, 8);
    }

    #[test]
    fn test_no_match_fails() {
        let candidates = [candidate(1, 5, 6, 5, 0)];
        assert_eq!(
            select_config(&candidates, &GraphicsAttributes::default()),
            Err(GraphicsError::NoMatchingConfig)
        );
        assert_eq!(
            select_config(&[], &GraphicsAttributes::default()),
            Err(GraphicsError::NoMatchingConfig)
        );
    }

    #[test]
    fn test_ambiguous_match_fails_deterministically() {
        let candidates = [
            candidate(1, 8, 8, 8, 8),
            candidate(2, 8, 8, 8, 8),
            candidate(3, 8, 8, 8, 8),
        ];
        for _ in 0..3 {
            assert_eq!(
                select_config(&candidates, &GraphicsAttributes::default()),
                Err(GraphicsError::AmbiguousConfig { count: 3 })
            );
        }
    }

    #[test]
    fn test_sample_count_is_part_of_the_match() {
        let mut multisampled = candidate(1, 8, 8, 8, 8);
        multisampled.attributes.samples = 4;
        let candidates = [multisampled, candidate(2, 8, 8, 8, 8)];
        let config = select_config(&candidates, &GraphicsAttributes::default()).unwrap();
        assert_eq!(config.handle(), ConfigHandle(2));
    }
}

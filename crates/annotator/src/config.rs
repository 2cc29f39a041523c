use anchoring::AnchorOptions;
use core_types::Millis;
use serde::Deserialize;
use store::UserSelectAction;

/// Whether a click selects the topmost hit or every annotation under it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Single,
    All,
}

/// Which painter draws the highlights.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    #[default]
    Spans,
    Highlights,
    Canvas,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid annotator config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Tunables of one annotator instance.
///
/// Every field has a default, so a config file only lists what it changes:
///
/// ```toml
/// click_timeout_ms = 250
/// selection_mode = "all"
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotatorConfig {
    /// A press released faster than this without a selection is a click.
    pub click_timeout_ms: Millis,
    /// Selection changes this soon after a press start a new target even
    /// when no `selectstart` arrived.
    pub selection_start_window_ms: Millis,
    pub redraw_debounce_ms: Millis,
    /// Debounce of resize and DOM mutation before positions are recomputed.
    pub recalculate_debounce_ms: Millis,
    pub context_len: usize,
    pub offset_reference_class: Option<String>,
    pub selection_mode: SelectionMode,
    pub user_select_action: UserSelectAction,
    pub quote_fallback: bool,
    pub renderer: RendererKind,
    pub lazy_max_attempts: u32,
    pub lazy_retry_delay_ms: Millis,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            click_timeout_ms: 300,
            selection_start_window_ms: 1000,
            redraw_debounce_ms: 10,
            recalculate_debounce_ms: 150,
            context_len: 0,
            offset_reference_class: None,
            selection_mode: SelectionMode::Single,
            user_select_action: UserSelectAction::Edit,
            quote_fallback: false,
            renderer: RendererKind::Spans,
            lazy_max_attempts: 5,
            lazy_retry_delay_ms: 1000,
        }
    }
}

impl AnnotatorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.click_timeout_ms == 0 {
            return Err(ConfigError::Zero {
                field: "click_timeout_ms",
            });
        }
        if self.lazy_max_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "lazy_max_attempts",
            });
        }
        Ok(())
    }

    pub fn anchor_options(&self) -> AnchorOptions {
        AnchorOptions {
            offset_reference_class: self.offset_reference_class.clone(),
            context_len: self.context_len,
            quote_fallback: self.quote_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(
            AnnotatorConfig::from_toml_str("").unwrap(),
            AnnotatorConfig::default()
        );
    }

    #[test]
    fn partial_override() {
        let config = AnnotatorConfig::from_toml_str(
            r#"
            click_timeout_ms = 250
            selection_mode = "all"
            user_select_action = "select"
            offset_reference_class = "chapter"
            renderer = "canvas"
            "#,
        )
        .unwrap();
        assert_eq!(config.click_timeout_ms, 250);
        assert_eq!(config.selection_mode, SelectionMode::All);
        assert_eq!(config.user_select_action, UserSelectAction::Select);
        assert_eq!(config.renderer, RendererKind::Canvas);
        assert_eq!(config.redraw_debounce_ms, 10);
        assert_eq!(
            config.anchor_options().offset_reference_class.as_deref(),
            Some("chapter")
        );
    }

    #[test]
    fn rejects_unknown_keys_and_zero_timeouts() {
        assert!(matches!(
            AnnotatorConfig::from_toml_str("click_timout_ms = 5"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            AnnotatorConfig::from_toml_str("click_timeout_ms = 0"),
            Err(ConfigError::Zero { .. })
        ));
    }
}

use crate::error::ApiError;

/// Maximum text length for synthesis requests (characters)
const MAX_TEXT_LENGTH: usize = 5000;
/// Maximum voice description length (characters)
const MAX_DESCRIPTION_LENGTH: usize = 500;
/// Upper bound for the (currently inert) speed factor
const MAX_SPEED: f32 = 4.0;

/// Validate a synthesis request before it reaches the models.
pub fn validate_synthesis_request(
    text: &str,
    voice_description: Option<&str>,
    speed: f32,
) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }

    if let Some(description) = voice_description {
        if description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(ApiError::InvalidInput(format!(
                "Voice description too long (max {} characters)",
                MAX_DESCRIPTION_LENGTH
            )));
        }
    }

    if !speed.is_finite() || speed <= 0.0 || speed > MAX_SPEED {
        return Err(ApiError::InvalidInput(format!(
            "Invalid speed {speed}: expected a value in (0, {MAX_SPEED}]"
        )));
    }

    Ok(())
}

//! Submission rules for new complaints.

use crate::{LifecycleConfig, ValidationFailure};
use civic_types::{ImageAttachment, Location};

/// Whitespace-separated words; runs of whitespace count once.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Checks one image against the type and size limits.
pub fn validate_image(
    image: &ImageAttachment,
    config: &LifecycleConfig,
) -> Result<(), ValidationFailure> {
    if !image.is_image() {
        return Err(ValidationFailure::NotAnImage {
            reference: image.reference.clone(),
            mime_type: image.mime_type.clone(),
        });
    }
    if image.size_bytes > config.max_image_bytes {
        return Err(ValidationFailure::ImageTooLarge {
            reference: image.reference.clone(),
            size_bytes: image.size_bytes,
            max_bytes: config.max_image_bytes,
        });
    }
    Ok(())
}

pub(crate) fn validate_submission(
    description: &str,
    location: &Location,
    images: &[ImageAttachment],
    config: &LifecycleConfig,
) -> Result<(), ValidationFailure> {
    let words = word_count(description);
    if words < config.min_description_words {
        return Err(ValidationFailure::DescriptionTooShort {
            words,
            min: config.min_description_words,
        });
    }
    if location.street.trim().is_empty() {
        return Err(ValidationFailure::MissingStreet);
    }
    if location.detail.trim().is_empty() {
        return Err(ValidationFailure::MissingLocationDetail);
    }
    if images.len() < config.min_images {
        return Err(ValidationFailure::TooFewImages {
            count: images.len(),
            min: config.min_images,
        });
    }
    if images.len() > config.max_images {
        return Err(ValidationFailure::TooManyImages {
            count: images.len(),
            max: config.max_images,
        });
    }
    images
        .iter()
        .try_for_each(|image| validate_image(image, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> Location {
        Location {
            street: "Sector 5".to_string(),
            detail: "Near Park".to_string(),
        }
    }

    fn image(mime: &str, size: u64) -> ImageAttachment {
        ImageAttachment {
            reference: "att-01".to_string(),
            mime_type: mime.to_string(),
            size_bytes: size,
        }
    }

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn word_count_ignores_extra_whitespace() {
        assert_eq!(word_count("  pothole \n near\tthe   school "), 4);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn description_minimum_is_inclusive() {
        let config = LifecycleConfig::default();
        assert!(validate_submission(&words(40), &location(), &[], &config).is_ok());
        assert_eq!(
            validate_submission(&words(39), &location(), &[], &config),
            Err(ValidationFailure::DescriptionTooShort { words: 39, min: 40 })
        );
    }

    #[test]
    fn image_limits() {
        let config = LifecycleConfig::default();
        let six = vec![image("image/png", 10); 6];
        assert!(matches!(
            validate_submission(&words(40), &location(), &six, &config),
            Err(ValidationFailure::TooManyImages { count: 6, max: 5 })
        ));

        let big = [image("image/jpeg", config.max_image_bytes + 1)];
        assert!(matches!(
            validate_submission(&words(40), &location(), &big, &config),
            Err(ValidationFailure::ImageTooLarge { .. })
        ));

        let at_limit = [image("image/jpeg", config.max_image_bytes)];
        assert!(validate_submission(&words(40), &location(), &at_limit, &config).is_ok());

        let pdf = [image("application/pdf", 10)];
        assert!(matches!(
            validate_submission(&words(40), &location(), &pdf, &config),
            Err(ValidationFailure::NotAnImage { .. })
        ));

        let strict = LifecycleConfig {
            min_images: 1,
            ..LifecycleConfig::default()
        };
        assert!(matches!(
            validate_submission(&words(40), &location(), &[], &strict),
            Err(ValidationFailure::TooFewImages { count: 0, min: 1 })
        ));
    }

    #[test]
    fn location_parts_are_required() {
        let config = LifecycleConfig::default();
        let mut no_street = location();
        no_street.street = "  ".to_string();
        assert_eq!(
            validate_submission(&words(40), &no_street, &[], &config),
            Err(ValidationFailure::MissingStreet)
        );

        let mut no_detail = location();
        no_detail.detail = String::new();
        assert_eq!(
            validate_submission(&words(40), &no_detail, &[], &config),
            Err(ValidationFailure::MissingLocationDetail)
        );
    }
}

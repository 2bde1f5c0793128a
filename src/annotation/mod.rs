mod hypothesis;
mod reconcile;
mod variants;

pub use hypothesis::{
    DEFAULT_SAMPLE_ROWS, HypothesisGenerator, Hypotheses, MAX_SAMPLE_ROWS, MIN_SAMPLE_ROWS,
    clamp_row_limit, column_hypothesis, is_identifier_like, is_natural_key,
};
pub use reconcile::{
    ReconcilePolicy, answered_question_count, default_business_context, reconcile_annotations,
    reconcile_annotations_with_policy,
};
pub use variants::{VariantContexts, build_contexts, context_fingerprint, raw_context};

/// Splits `carID`, `car_id` and `Car-Id` alike into lowercase word tokens.
pub(crate) fn name_tokens(name: &str) -> Vec<String> {
    let mut tokens = Vec::<String>::new();
    let mut current = String::new();
    let mut previous_lower = false;

    for character in name.chars() {
        if !character.is_ascii_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            previous_lower = false;
            continue;
        }

        if character.is_ascii_uppercase() && previous_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        previous_lower = character.is_ascii_lowercase() || character.is_ascii_digit();
        current.push(character.to_ascii_lowercase());
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

pub(crate) fn humanize(name: &str) -> String {
    let tokens = name_tokens(name);
    if tokens.is_empty() {
        name.to_string()
    } else {
        tokens.join(" ")
    }
}

/// Naive English singular used to name the entity a table stores.
pub(crate) fn singular_entity(table_name: &str) -> String {
    let human = humanize(table_name);
    if let Some(stem) = human.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if human.ends_with("ss") || human.len() <= 3 {
        return human;
    }
    human.strip_suffix('s').map(str::to_string).unwrap_or(human)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_tokens_split_snake_and_camel_case() {
        assert_eq!(name_tokens("car_id"), vec!["car", "id"]);
        assert_eq!(name_tokens("carID"), vec!["car", "id"]);
        assert_eq!(name_tokens("CarId"), vec!["car", "id"]);
        assert_eq!(name_tokens("paid"), vec!["paid"]);
        assert_eq!(name_tokens("model-year 2"), vec!["model", "year", "2"]);
    }

    #[test]
    fn singular_entity_handles_common_plurals() {
        assert_eq!(singular_entity("cars"), "car");
        assert_eq!(singular_entity("countries"), "country");
        assert_eq!(singular_entity("address"), "address");
        assert_eq!(singular_entity("car_makers"), "car maker");
        assert_eq!(singular_entity("bus"), "bus");
    }
}

//! Turns a business profile into the instruction text a model receives.

use bizchat_db::BusinessProfile;

/// Build the system instruction stored at the head of every new conversation.
///
/// A non-blank custom prompt wins outright. Otherwise the clauses are joined
/// in a fixed order: identity, tone, description, services, features, hours,
/// communication style, knowledge focus.
pub fn build_system_prompt(profile: &BusinessProfile) -> String {
    if let Some(custom) = profile.custom_prompt_override() {
        return custom.to_string();
    }

    let mut prompt = format!(
        "You are an AI assistant for a {} called {}. ",
        profile.industry.label(),
        profile.business_name
    );
    prompt.push_str(&format!("Respond in a {}. ", profile.personality.phrase()));

    let description = profile.description.trim();
    prompt.push_str(&format!(
        "You can assist with information about {}. ",
        if description.is_empty() {
            "the business"
        } else {
            description
        }
    ));

    if !profile.services.is_empty() {
        prompt.push_str(&format!(
            "Our services include: {}. ",
            profile.services.join(", ")
        ));
    }

    if !profile.features.is_empty() {
        prompt.push_str(&format!(
            "Special features: {}. ",
            profile.features.join(", ")
        ));
    }

    prompt.push_str(&format!("Business hours are {}. ", profile.hours));

    let style = communication_phrases(profile);
    if !style.is_empty() {
        prompt.push_str(&style.join(", "));
        prompt.push_str(". ");
    }

    if let Some(focus) = profile.knowledge_focus.instruction() {
        prompt.push_str(focus);
    }

    prompt.trim_end().to_string()
}

fn communication_phrases(profile: &BusinessProfile) -> Vec<&'static str> {
    let style = &profile.communication_style;
    [
        (style.concise, "be concise in your responses"),
        (style.questions, "ask follow-up questions when appropriate"),
        (style.informative, "provide detailed information when needed"),
        (style.empathetic, "show empathy when customers express concerns"),
    ]
    .into_iter()
    .filter_map(|(enabled, phrase)| enabled.then_some(phrase))
    .collect()
}

/// First assistant message of a new conversation.
pub fn build_welcome_message(profile: &BusinessProfile) -> String {
    let mut welcome = format!(
        "Hi there! I'm the AI assistant for {}. ",
        profile.business_name
    );

    if !profile.services.is_empty() {
        welcome.push_str(&format!("We offer {}. ", profile.services.join(", ")));
    }

    let hours = profile.hours.trim();
    if !hours.is_empty() {
        welcome.push_str(&format!("Our business hours are {}. ", hours));
    }

    welcome.push_str("How can I help you today?");
    welcome
}

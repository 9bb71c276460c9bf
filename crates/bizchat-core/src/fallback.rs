//! Deterministic replies used when the model cannot produce one.

use bizchat_db::BusinessProfile;

const HOURS_WORDS: &[&str] = &["hour", "open", "close"];
const SERVICE_WORDS: &[&str] = &["service", "offer", "provide"];
const LOCATION_WORDS: &[&str] = &["location", "address", "where"];
const BOOKING_WORDS: &[&str] = &["appointment", "schedule", "book"];
const PRICE_WORDS: &[&str] = &["price", "cost", "fee"];
const GREETING_WORDS: &[&str] = &["hello", "hi", "hey"];

/// Pick a canned reply from keywords in `message`. Never returns an empty
/// string and never fails.
pub fn keyword_fallback(message: &str, profile: &BusinessProfile) -> String {
    let lower = message.to_lowercase();
    let name = &profile.business_name;
    let contains_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if contains_any(HOURS_WORDS) {
        return format!(
            "{} is open {}. Is there a specific day you're planning to visit?",
            name,
            hours_or_default(profile)
        );
    }

    if contains_any(SERVICE_WORDS) {
        return match services_list(profile, usize::MAX) {
            Some(services) => format!(
                "At {}, we offer a range of services including {}. Is there a specific service you'd like to know more about?",
                name, services
            ),
            None => format!(
                "{} offers a range of services. Is there something specific you'd like to know more about?",
                name
            ),
        };
    }

    if contains_any(LOCATION_WORDS) {
        let location = profile
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or("our location (please contact us for details)");
        return format!(
            "{} is located at {}. Would you like any other information?",
            name, location
        );
    }

    if contains_any(BOOKING_WORDS) {
        return format!(
            "I'd be happy to help you schedule an appointment at {}. Our business hours are {}. Would you prefer morning or afternoon? Also, is this for a specific service or a routine visit?",
            name,
            hours_or_default(profile)
        );
    }

    if contains_any(PRICE_WORDS) {
        return format!(
            "The pricing for our services at {} varies depending on specific needs and requirements. We'd be happy to provide you with more details when you visit or call us. Is there a specific service you're interested in?",
            name
        );
    }

    // Greetings match whole words so "this" or "which" are not read as "hi".
    if lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| GREETING_WORDS.contains(&word))
    {
        return match services_list(profile, 3) {
            Some(services) => format!(
                "Hello! Welcome to {}. We're a {} offering {}, and more. How can I assist you today?",
                name,
                profile.industry.label(),
                services
            ),
            None => format!(
                "Hello! Welcome to {}. How can I assist you today?",
                name
            ),
        };
    }

    if lower.contains("thank") {
        return format!(
            "You're welcome! Is there anything else I can help you with regarding {} or our services?",
            name
        );
    }

    match services_list(profile, 3) {
        Some(services) => format!(
            "At {}, we specialize in {}. Our business hours are {}. How can I help you further with any specific information?",
            name,
            services,
            hours_or_default(profile)
        ),
        None => format!(
            "Thanks for reaching out to {}. Our business hours are {}. How can I help you further with any specific information?",
            name,
            hours_or_default(profile)
        ),
    }
}

fn services_list(profile: &BusinessProfile, max: usize) -> Option<String> {
    let services: Vec<&str> = profile
        .services
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .take(max)
        .collect();
    (!services.is_empty()).then(|| services.join(", "))
}

fn hours_or_default(profile: &BusinessProfile) -> &str {
    let hours = profile.hours.trim();
    if hours.is_empty() {
        "available on request"
    } else {
        hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizchat_db::Industry;

    fn salon() -> BusinessProfile {
        let mut profile = BusinessProfile::new("owner", Industry::Salon, "Shear Joy");
        profile.services = vec![
            "Haircuts".to_string(),
            "Coloring".to_string(),
            "Styling".to_string(),
            "Perms".to_string(),
        ];
        profile.hours = "Mon-Fri 9-5".to_string();
        profile
    }

    #[test]
    fn test_hours_question_mentions_hours() {
        let reply = keyword_fallback("What are your hours?", &salon());
        assert!(reply.contains("Mon-Fri 9-5"));
    }

    #[test]
    fn test_first_rule_wins() {
        // "open" (hours) beats "book" (appointment)
        let reply = keyword_fallback("Are you open so I can book?", &salon());
        assert!(reply.starts_with("Shear Joy is open"));
    }

    #[test]
    fn test_services_listed() {
        let reply = keyword_fallback("What services do you offer?", &salon());
        assert!(reply.contains("Haircuts, Coloring, Styling, Perms"));
    }

    #[test]
    fn test_location_without_address() {
        let reply = keyword_fallback("Where are you?", &salon());
        assert!(reply.contains("please contact us for details"));
    }

    #[test]
    fn test_greeting_limits_services_to_three() {
        let reply = keyword_fallback("Hey there", &salon());
        assert!(reply.contains("Haircuts, Coloring, Styling, and more"));
        assert!(!reply.contains("Perms"));
    }

    #[test]
    fn test_hi_inside_words_is_not_a_greeting() {
        let reply = keyword_fallback("Is this worth it?", &salon());
        assert!(!reply.starts_with("Hello!"));
    }

    #[test]
    fn test_default_names_business_and_services() {
        let reply = keyword_fallback("Do you like dogs?", &salon());
        assert!(reply.contains("Shear Joy"));
        assert!(reply.contains("Haircuts, Coloring, Styling"));
        assert!(!reply.contains("Perms"));
    }

    #[test]
    fn test_total_for_awkward_input() {
        let mut bare = BusinessProfile::new("owner", Industry::Other, "Nameless");
        bare.hours = String::new();

        for message in ["", "   ", "ÄÖÜ 🚀", "price?", "services", "hi", "thanks!", "open"] {
            let reply = keyword_fallback(message, &bare);
            assert!(!reply.trim().is_empty(), "empty reply for {message:?}");
            assert!(reply.contains("Nameless"));
        }
    }
}

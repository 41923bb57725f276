#[derive(Debug)]
pub enum Validity {
    Valid,
    Invalid(String),
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        match &self {
            Validity::Valid => true,
            Validity::Invalid(_) => false,
        }
    }
}

pub fn validate_email_address(email: &str) -> Validity {
    if email.chars().count() > 320 {
        return Validity::Invalid(String::from("Email address is too long."));
    }

    for c in email.chars() {
        if c == ' ' || !c.is_ascii() {
            return Validity::Invalid(String::from(
                "Email address cannot contain a space or non-ASCII characters.",
            ));
        }
    }

    if email.contains("@.") {
        return Validity::Invalid(String::from(
            "Domain name in email address cannot begin with a period.",
        ));
    }

    let email = match email.split_once('@') {
        Some(s) => s,
        None => {
            return Validity::Invalid(String::from("Email address must contain an at symbol (@)."))
        }
    };

    if email.0.is_empty() || email.1.len() < 3 {
        return Validity::Invalid(String::from("Email username or domain name is too short."));
    }

    if email.1.contains('@') || !email.1.contains('.') {
        return Validity::Invalid(String::from(
            "Email address must have only one at symbol (@) and the domain must contain a period.",
        ));
    }

    if email.1.ends_with('.') {
        return Validity::Invalid(String::from("Email address cannot end with a period."));
    }

    Validity::Valid
}

pub fn validate_phone_number(phone: &str) -> Validity {
    let digits = phone.strip_prefix('+').unwrap_or(phone);

    if digits.len() < 7 || digits.len() > 15 {
        return Validity::Invalid(String::from(
            "Phone number must be between 7 and 15 digits.",
        ));
    }

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Validity::Invalid(String::from(
            "Phone number may only contain digits and an optional leading plus sign.",
        ));
    }

    Validity::Valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email_address() {
        assert!(validate_email_address("voter@example.com").is_valid());
        assert!(validate_email_address("first.last@example.co.uk").is_valid());
        assert!(validate_email_address("voter+tag@example-one.com").is_valid());
        assert!(validate_email_address("1234567890@123.123.123.123").is_valid());
        assert!(validate_email_address("_______@example.com").is_valid());

        assert!(!validate_email_address("vo ter@example.com").is_valid());
        assert!(!validate_email_address("votér@example.com").is_valid());
        assert!(!validate_email_address("voter@exam.com@ple.com").is_valid());
        assert!(!validate_email_address("voterexample.com").is_valid());
        assert!(!validate_email_address("voter@.com").is_valid());
        assert!(!validate_email_address("voter@example.com.").is_valid());
        assert!(!validate_email_address("@example.com").is_valid());

        let mut too_long = "a".repeat(310);
        too_long.push_str("@example.com");
        assert!(!validate_email_address(&too_long).is_valid());
    }

    #[test]
    fn test_validate_phone_number() {
        assert!(validate_phone_number("+2348012345678").is_valid());
        assert!(validate_phone_number("08012345678").is_valid());
        assert!(validate_phone_number("1234567").is_valid());

        assert!(!validate_phone_number("123456").is_valid());
        assert!(!validate_phone_number("1234567890123456").is_valid());
        assert!(!validate_phone_number("+234-801-234-5678").is_valid());
        assert!(!validate_phone_number("080 1234 5678").is_valid());
        assert!(!validate_phone_number("not-a-number").is_valid());
    }
}

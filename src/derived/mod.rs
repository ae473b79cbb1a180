//! Derived-state engine - pure functions over cached snapshots
//!
//! Everything here is deterministic and side-effect free:
//! - Duplicate contact detection for entry forms
//! - Profile completeness scoring
//! - Recurring-task due-date advancement
//!
//! Missing or malformed optional fields are treated as absent, never as
//! errors; these functions cannot fail.

use chrono::{Duration, Months, NaiveDate};

use crate::models::{Contact, Recurrence};

// ============================================================================
// Duplicate detection
// ============================================================================

/// Maximum number of duplicate candidates to surface
const MAX_DUPLICATES: usize = 3;

/// Find existing contacts that look like the one being entered.
///
/// Matching rules:
/// - name: case-insensitive, existing name contains the candidate
/// - email: exact case-insensitive match against any existing email
/// - phone: digits-only normalization, existing number contains the candidate
///
/// `exclude_id` removes the contact being edited from consideration.
/// All-empty input yields no candidates. Capped at three results.
pub fn find_duplicates<'a>(
    contacts: &'a [Contact],
    name: &str,
    email: &str,
    phone: &str,
    exclude_id: Option<&str>,
) -> Vec<&'a Contact> {
    let name = name.trim().to_lowercase();
    let email = email.trim().to_lowercase();
    let phone_digits = digits_only(phone);

    if name.is_empty() && email.is_empty() && phone_digits.is_empty() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for contact in contacts {
        if exclude_id == Some(contact.id.as_str()) {
            continue;
        }

        let name_hit = !name.is_empty() && contact.name.to_lowercase().contains(&name);
        let email_hit = !email.is_empty()
            && contact
                .emails
                .iter()
                .any(|e| e.trim().to_lowercase() == email);
        let phone_hit = !phone_digits.is_empty()
            && contact
                .phones
                .iter()
                .any(|p| digits_only(p).contains(&phone_digits));

        if name_hit || email_hit || phone_hit {
            matches.push(contact);
            if matches.len() == MAX_DUPLICATES {
                break;
            }
        }
    }
    matches
}

fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

// ============================================================================
// Profile completeness
// ============================================================================

/// Completeness score with filled/missing labels in checklist order
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Completeness {
    pub percentage: u32,
    pub filled: Vec<&'static str>,
    pub missing: Vec<&'static str>,
}

pub fn profile_completeness(contact: &Contact) -> Completeness {
    // Weighted checklist, in display order. Weights sum to 100.
    let checklist: [(&'static str, u32, bool); 11] = [
        ("Name", 15, !contact.name.trim().is_empty()),
        ("Email", 15, !contact.emails.is_empty()),
        ("Phone", 15, !contact.phones.is_empty()),
        ("Company", 10, has_text(&contact.company)),
        ("Address", 10, has_text(&contact.address)),
        ("Birthday", 10, contact.birthday.is_some()),
        ("Anniversary", 5, contact.anniversary.is_some()),
        ("WhatsApp", 5, has_text(&contact.whatsapp_number)),
        ("Instagram", 5, has_text(&contact.instagram_handle)),
        ("Notes", 5, has_text(&contact.notes)),
        ("Photo", 5, has_text(&contact.profile_picture)),
    ];

    let mut earned = 0u32;
    let mut total = 0u32;
    let mut filled = Vec::new();
    let mut missing = Vec::new();

    for (label, weight, present) in checklist {
        total += weight;
        if present {
            earned += weight;
            filled.push(label);
        } else {
            missing.push(label);
        }
    }

    Completeness {
        percentage: ((earned as f64 / total as f64) * 100.0).round() as u32,
        filled,
        missing,
    }
}

fn has_text(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

// ============================================================================
// Recurrence advancement
// ============================================================================

/// Next due date for a recurring task.
///
/// Month-based steps clamp to the last day of the target month
/// (2024-01-31 + Monthly = 2024-02-29). `Recurrence::None` returns the
/// input unchanged.
pub fn advance_due_date(date: NaiveDate, recurrence: Recurrence) -> NaiveDate {
    match recurrence {
        Recurrence::None => date,
        Recurrence::Daily => date + Duration::days(1),
        Recurrence::Weekly => date + Duration::days(7),
        Recurrence::Biweekly => date + Duration::days(14),
        Recurrence::Monthly => date.checked_add_months(Months::new(1)).unwrap_or(date),
        Recurrence::Quarterly => date.checked_add_months(Months::new(3)).unwrap_or(date),
        Recurrence::Yearly => date.checked_add_months(Months::new(12)).unwrap_or(date),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: &str, name: &str, emails: &[&str], phones: &[&str]) -> Contact {
        let mut c = Contact::new("u1", name);
        c.id = id.to_string();
        c.emails = emails.iter().map(|s| s.to_string()).collect();
        c.phones = phones.iter().map(|s| s.to_string()).collect();
        c
    }

    #[test]
    fn test_all_empty_input_yields_nothing() {
        let contacts = vec![contact("1", "Jane Doe", &["jane@x.com"], &[])];
        assert!(find_duplicates(&contacts, "", " ", "- ()", None).is_empty());
    }

    #[test]
    fn test_name_match_is_substring_case_insensitive() {
        let contacts = vec![
            contact("1", "Jane Doe", &[], &[]),
            contact("2", "John Smith", &[], &[]),
        ];
        let hits = find_duplicates(&contacts, "jane", "", "", None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");

        // Candidate longer than any existing name: no hit.
        assert!(find_duplicates(&contacts, "Jane Doering", "", "", None).is_empty());
    }

    #[test]
    fn test_email_match_is_exact_case_insensitive() {
        let contacts = vec![contact("1", "Jane", &["Jane@Example.com"], &[])];
        assert_eq!(find_duplicates(&contacts, "", "jane@example.com", "", None).len(), 1);
        assert!(find_duplicates(&contacts, "", "jane@example", "", None).is_empty());
    }

    #[test]
    fn test_phone_match_normalizes_to_digits() {
        let contacts = vec![contact("1", "Jane", &[], &["+1 (555) 123-4567"])];
        let hits = find_duplicates(&contacts, "", "", "555 123 4567", None);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_exclude_id_filters_self() {
        let contacts = vec![contact("1", "Jane Doe", &[], &[])];
        assert!(find_duplicates(&contacts, "Jane", "", "", Some("1")).is_empty());
    }

    #[test]
    fn test_capped_at_three() {
        let contacts: Vec<_> = (0..10)
            .map(|i| contact(&i.to_string(), &format!("Jane {}", i), &[], &[]))
            .collect();
        assert_eq!(find_duplicates(&contacts, "jane", "", "", None).len(), 3);
    }

    #[test]
    fn test_detection_is_idempotent() {
        let contacts: Vec<_> = (0..5)
            .map(|i| contact(&i.to_string(), &format!("Jane {}", i), &[], &[]))
            .collect();
        let first: Vec<String> = find_duplicates(&contacts, "jane", "", "", None)
            .iter()
            .map(|c| c.id.clone())
            .collect();
        let second: Vec<String> = find_duplicates(&contacts, "jane", "", "", None)
            .iter()
            .map(|c| c.id.clone())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_completeness_name_only_is_15() {
        let c = contact("1", "Jane", &[], &[]);
        let score = profile_completeness(&c);
        assert_eq!(score.percentage, 15);
        assert_eq!(score.filled, vec!["Name"]);
        assert_eq!(score.missing.first(), Some(&"Email"));
    }

    #[test]
    fn test_completeness_full_profile_is_100() {
        let mut c = contact("1", "Jane", &["jane@x.com"], &["555"]);
        c.company = Some("Acme".into());
        c.address = Some("1 Main St".into());
        c.birthday = NaiveDate::from_ymd_opt(1990, 5, 1);
        c.anniversary = NaiveDate::from_ymd_opt(2015, 6, 2);
        c.whatsapp_number = Some("555".into());
        c.instagram_handle = Some("@jane".into());
        c.notes = Some("met at conf".into());
        c.profile_picture = Some("https://x/p.jpg".into());

        let score = profile_completeness(&c);
        assert_eq!(score.percentage, 100);
        assert!(score.missing.is_empty());
        assert_eq!(score.filled.len(), 11);
    }

    #[test]
    fn test_completeness_is_monotone_as_fields_fill() {
        let mut c = contact("1", "Jane", &[], &[]);
        let mut last = profile_completeness(&c).percentage;

        c.emails.push("jane@x.com".into());
        let next = profile_completeness(&c).percentage;
        assert!(next >= last);
        last = next;

        c.company = Some("Acme".into());
        assert!(profile_completeness(&c).percentage >= last);
    }

    #[test]
    fn test_blank_strings_do_not_count() {
        let mut c = contact("1", "Jane", &[], &[]);
        c.notes = Some("   ".into());
        let score = profile_completeness(&c);
        assert!(score.missing.contains(&"Notes"));
    }

    #[test]
    fn test_monthly_clamps_to_end_of_month() {
        let jan31 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            advance_due_date(jan31, Recurrence::Monthly),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn test_yearly_clamps_leap_day() {
        let leap = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            advance_due_date(leap, Recurrence::Yearly),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
    }

    #[test]
    fn test_day_based_steps() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(advance_due_date(d, Recurrence::Daily), d + Duration::days(1));
        assert_eq!(advance_due_date(d, Recurrence::Weekly), d + Duration::days(7));
        assert_eq!(advance_due_date(d, Recurrence::Biweekly), d + Duration::days(14));
        assert_eq!(
            advance_due_date(d, Recurrence::Quarterly),
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
        );
    }

    #[test]
    fn test_none_returns_input() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(advance_due_date(d, Recurrence::None), d);
    }
}

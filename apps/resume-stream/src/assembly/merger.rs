use crate::models::resume::{PartialResume, ResumeDocument};

/// Folds one snapshot into the accumulated document.
///
/// Each snapshot carries the whole of every section it mentions, so a present
/// section replaces the previous one outright and an absent section keeps the
/// previous value. Sections are never merged element by element; doing so
/// would duplicate list entries that every cumulative snapshot repeats.
///
/// Monotonicity is the extraction service's contract, not something enforced
/// here.
pub fn merge(previous: &ResumeDocument, incoming: PartialResume) -> ResumeDocument {
    ResumeDocument {
        contact: incoming.contact.or_else(|| previous.contact.clone()),
        summary: incoming.summary.or_else(|| previous.summary.clone()),
        work_experience: incoming
            .work_experience
            .or_else(|| previous.work_experience.clone()),
        education: incoming.education.or_else(|| previous.education.clone()),
        certifications: incoming
            .certifications
            .or_else(|| previous.certifications.clone()),
        projects: incoming.projects.or_else(|| previous.projects.clone()),
        skill_categories: incoming
            .skill_categories
            .or_else(|| previous.skill_categories.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::{ContactInfo, SkillCategory, WorkExperience};

    fn job(role: &str) -> WorkExperience {
        WorkExperience {
            role: role.to_string(),
            company: None,
            location: None,
            from_date: None,
            to_date: None,
            description: vec![],
        }
    }

    fn skills(name: &str, items: &[&str]) -> SkillCategory {
        SkillCategory {
            name: name.to_string(),
            skills: items.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_absent_sections_retain_previous() {
        let previous = ResumeDocument {
            summary: Some("Engineer".to_string()),
            work_experience: Some(vec![job("Software Engineer")]),
            ..Default::default()
        };
        let incoming = PartialResume {
            contact: Some(ContactInfo {
                name: Some("Jane Doe".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = merge(&previous, incoming);
        assert_eq!(merged.summary.as_deref(), Some("Engineer"));
        assert_eq!(merged.work_experience, previous.work_experience);
        assert_eq!(
            merged.contact.and_then(|c| c.name).as_deref(),
            Some("Jane Doe")
        );
    }

    #[test]
    fn test_present_section_replaces_in_full() {
        let previous = ResumeDocument {
            work_experience: Some(vec![job("Senior Software Engineer")]),
            ..Default::default()
        };
        let incoming = PartialResume {
            work_experience: Some(vec![job("Senior Software Engineer"), job("Software Engineer")]),
            ..Default::default()
        };

        let merged = merge(&previous, incoming);
        let roles: Vec<_> = merged
            .work_experience
            .unwrap()
            .into_iter()
            .map(|w| w.role)
            .collect();
        // No duplicated first element.
        assert_eq!(roles, vec!["Senior Software Engineer", "Software Engineer"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let base = ResumeDocument {
            summary: Some("Engineer".to_string()),
            ..Default::default()
        };
        let partial = PartialResume {
            skill_categories: Some(vec![skills("Frontend", &["React", "Vue.js"])]),
            work_experience: Some(vec![job("Software Engineer")]),
            ..Default::default()
        };

        let once = merge(&base, partial.clone());
        let twice = merge(&once, partial);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_previous_is_left_untouched() {
        let previous = ResumeDocument {
            summary: Some("Engineer".to_string()),
            ..Default::default()
        };
        let snapshot = previous.clone();
        let _ = merge(
            &previous,
            PartialResume {
                summary: Some("Staff Engineer".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(previous, snapshot);
    }

    #[test]
    fn test_empty_incoming_is_identity() {
        let previous = ResumeDocument {
            skill_categories: Some(vec![skills("Tools", &["Git"])]),
            ..Default::default()
        };
        assert_eq!(merge(&previous, PartialResume::default()), previous);
    }
}

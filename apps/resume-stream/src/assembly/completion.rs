use serde::{Deserialize, Serialize};

use crate::models::resume::ResumeDocument;

/// The seven top-level sections of a résumé, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Contact,
    Summary,
    WorkExperience,
    Education,
    Certifications,
    Projects,
    SkillCategories,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Contact,
        Section::Summary,
        Section::WorkExperience,
        Section::Education,
        Section::Certifications,
        Section::Projects,
        Section::SkillCategories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Contact => "contact",
            Section::Summary => "summary",
            Section::WorkExperience => "work_experience",
            Section::Education => "education",
            Section::Certifications => "certifications",
            Section::Projects => "projects",
            Section::SkillCategories => "skill_categories",
        }
    }

    /// Whether this section's check is satisfied by `doc`.
    fn is_satisfied(&self, doc: &ResumeDocument) -> bool {
        match self {
            Section::Contact => doc
                .contact
                .as_ref()
                .and_then(|c| c.name.as_deref())
                .is_some_and(|name| !name.trim().is_empty()),
            Section::Summary => doc.summary.as_deref().is_some_and(|s| !s.trim().is_empty()),
            Section::WorkExperience => has_items(&doc.work_experience),
            Section::Education => has_items(&doc.education),
            Section::Certifications => has_items(&doc.certifications),
            Section::Projects => has_items(&doc.projects),
            Section::SkillCategories => has_items(&doc.skill_categories),
        }
    }
}

fn has_items<T>(section: &Option<Vec<T>>) -> bool {
    section.as_ref().is_some_and(|items| !items.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionCheck {
    pub section: Section,
    pub satisfied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReport {
    pub score: u8,
    pub checks: Vec<SectionCheck>,
    pub missing_sections: Vec<Section>,
}

/// 0–100 completion score. Every section weighs 100/7 and the total is
/// rounded once, so two satisfied checks give 29 and not 2 × 14.
pub fn score(doc: &ResumeDocument) -> u8 {
    let satisfied = Section::ALL
        .iter()
        .filter(|section| section.is_satisfied(doc))
        .count();
    percent(satisfied)
}

pub fn completion_report(doc: &ResumeDocument) -> CompletionReport {
    let checks: Vec<SectionCheck> = Section::ALL
        .iter()
        .map(|section| SectionCheck {
            section: *section,
            satisfied: section.is_satisfied(doc),
        })
        .collect();

    let missing_sections = checks
        .iter()
        .filter(|c| !c.satisfied)
        .map(|c| c.section)
        .collect();
    let satisfied = checks.iter().filter(|c| c.satisfied).count();

    CompletionReport {
        score: percent(satisfied),
        checks,
        missing_sections,
    }
}

fn percent(satisfied: usize) -> u8 {
    let total = Section::ALL.len() as f64;
    ((satisfied as f64 * 100.0 / total).round() as u8).min(100)
}

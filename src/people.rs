use std::{fs, io::ErrorKind, path::Path};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Name particles that belong to the surname that follows them.
const NAME_PARTICLES: &[&str] = &["von", "van", "de", "la", "du", "di", "del"];

/// One entry of the group members YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Member {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub status: String,
    pub website: Option<String>,
    pub image: Option<String>,
    pub research_interest: Option<String>,
}

impl Member {
    /// Alumni are recognised from their status text ("Alumni ...", "Former postdoc", ...).
    pub fn is_alumni(&self) -> bool {
        let status = self.status.to_lowercase();
        status.starts_with("alumni") || status.contains("former")
    }

    pub fn sort_key(&self) -> String {
        last_name(&self.name).to_lowercase()
    }
}

pub fn parse_members(yaml: &str) -> Result<Vec<Member>> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    // `~` / `null` documents are an empty roster too.
    let members: Option<Vec<Member>> = serde_yaml::from_str(yaml)?;
    Ok(members.unwrap_or_default())
}

pub fn load_members(path: &Path) -> Result<Vec<Member>> {
    let text = fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
    parse_members(&text)
}

/// Names used to highlight group members in author lists: each full name and its last token.
///
/// A missing members file just means nobody is highlighted.
pub fn roster_names(path: &Path) -> Result<Vec<String>> {
    let members = match fs::read_to_string(path) {
        Ok(text) => parse_members(&text)?,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::read(path, e)),
    };
    Ok(members
        .into_iter()
        .flat_map(|m| {
            let last = m.name.split_whitespace().last().map(str::to_string);
            std::iter::once(m.name).chain(last)
        })
        .collect())
}

/// Surname used for ordering: parentheticals are ignored and a leading particle stays with
/// the surname ("John von Neumann" sorts under "von Neumann").
pub fn last_name(name: &str) -> String {
    let base = name.split('(').next().unwrap_or(name).trim();
    let parts: Vec<&str> = base.split_whitespace().collect();
    match parts.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [.., particle, last]
            if parts.len() > 2 && NAME_PARTICLES.contains(&particle.to_lowercase().as_str()) =>
        {
            format!("{particle} {last}")
        }
        [.., last] => (*last).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_name_keeps_particles() {
        assert_eq!(last_name("John von Neumann"), "von Neumann");
        assert_eq!(last_name("Jane M. Doe (Ph.D.)"), "Doe");
        assert_eq!(last_name("John Doe"), "Doe");
        assert_eq!(last_name("Cher"), "Cher");
        assert_eq!(last_name("Van Halen"), "Halen");
        assert_eq!(last_name(""), "");
    }

    #[test]
    fn last_name_ignores_parenthetical_suffix() {
        proptest::proptest!(|(first in "[A-Z][a-z]{1,8}", last in "[A-Z][a-z]{1,10}", note in "[A-Za-z. ]{0,12}")| {
            let name = format!("{first} {last} ({note})");
            proptest::prop_assert_eq!(last_name(&name), last);
        })
    }

    #[test]
    fn alumni_detection() {
        let m = |status: &str| Member {
            name: "A B".into(),
            role: "Postdoc".into(),
            status: status.into(),
            website: None,
            image: None,
            research_interest: None,
        };
        assert!(m("Alumni (2021)").is_alumni());
        assert!(m("Former PhD student").is_alumni());
        assert!(!m("Current").is_alumni());
    }

    #[test]
    fn parse_members_with_optional_fields() {
        let yaml = "- name: Paul Hayne\n  role: Principal Investigator\n  status: Current\n  website: https://example.org\n- name: Jo Lee\n  role: PhD Student\n  status: Current\n  research_interest: Lunar ice\n";
        let members = parse_members(yaml).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].website.as_deref(), Some("https://example.org"));
        assert_eq!(members[1].research_interest.as_deref(), Some("Lunar ice"));
        assert!(parse_members("").unwrap().is_empty());
    }

    #[test]
    fn roster_names_include_last_names() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("group_members.yml");
        fs::write(&path, "- name: Tyler Horvath\n  role: PhD Student\n  status: Current\n").unwrap();
        assert_eq!(roster_names(&path).unwrap(), vec!["Tyler Horvath", "Horvath"]);
        assert!(roster_names(&dir.path().join("missing.yml")).unwrap().is_empty());
    }
}

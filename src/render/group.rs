//! The group members page.

use std::path::Path;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{config::GroupConfig, people::Member};

pub const PRINCIPAL_INVESTIGATOR: &str = "Principal Investigator";
pub const POSTDOCS: &str = "Research Associates and Postdocs";
pub const OTHER: &str = "Other";

/// Display order of the current-member sections.
pub const ROLE_ORDER: &[&str] = &[
    PRINCIPAL_INVESTIGATOR,
    POSTDOCS,
    "PhD Student",
    "Graduate Student",
    "Undergraduate Student",
    OTHER,
];

const POSTDOC_ROLES: &[&str] = &["Research Associate", "Postdoc"];

const STYLE: &str = r#"<style>
.group-container {
  display: flex;
  flex-wrap: wrap;
  justify-content: flex-start;
  gap: 20px;
}
.group-member {
  width: 200px;
  margin-bottom: 30px;
}
.profile-img {
  width: 180px;
  height: 180px;
  object-fit: cover;
  border-radius: 5px;
}
.role {
  margin: 0;
  color: #555;
}
.status {
  margin: 0;
  color: #777;
  font-style: italic;
}
.interests {
  margin-top: 5px;
  font-size: 0.9em;
}
</style>
"#;

static MANUAL_REGION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)</style>\s*(.*?)\s*\*Last updated:").unwrap());

/// Members grouped for display. Empty sections are never present.
#[derive(Debug, Default)]
pub struct Roster<'a> {
    pub current: Vec<(&'static str, Vec<&'a Member>)>,
    pub alumni: Vec<&'a Member>,
}

fn category(member: &Member, pinned_leader: &str) -> &'static str {
    if member.name == pinned_leader {
        return PRINCIPAL_INVESTIGATOR;
    }
    if POSTDOC_ROLES.contains(&member.role.as_str()) {
        return POSTDOCS;
    }
    ROLE_ORDER
        .iter()
        .copied()
        .find(|r| *r == member.role)
        .unwrap_or(OTHER)
}

pub fn categorize<'a>(members: &'a [Member], pinned_leader: &str) -> Roster<'a> {
    let mut current: Vec<(&'static str, Vec<&Member>)> =
        ROLE_ORDER.iter().map(|r| (*r, Vec::new())).collect();
    let mut alumni = Vec::new();

    for member in members {
        if member.is_alumni() {
            alumni.push(member);
            continue;
        }
        let cat = category(member, pinned_leader);
        if let Some((_, group)) = current.iter_mut().find(|(r, _)| *r == cat) {
            group.push(member);
        }
    }

    current.retain(|(_, group)| !group.is_empty());
    for (_, group) in &mut current {
        group.sort_by_key(|m| m.sort_key());
    }
    alumni.sort_by_key(|m| m.sort_key());
    Roster { current, alumni }
}

fn heading(role: &str) -> String {
    if role == PRINCIPAL_INVESTIGATOR || role.ends_with('s') {
        role.to_string()
    } else {
        format!("{role}s")
    }
}

/// Hand-written text between the style block and the "Last updated" line, if any.
pub fn extract_manual_region(page: &str) -> Option<String> {
    let caps = MANUAL_REGION_RE.captures(page)?;
    let region = caps.get(1)?.as_str().trim();
    (!region.is_empty()).then(|| region.to_string())
}

pub struct GroupPage<'a> {
    cfg: &'a GroupConfig,
    image_dir: &'a Path,
}

impl<'a> GroupPage<'a> {
    pub fn new(cfg: &'a GroupConfig, image_dir: &'a Path) -> Self {
        GroupPage { cfg, image_dir }
    }

    fn image_for<'m>(&'m self, member: &'m Member) -> &'m str {
        match member.image.as_deref() {
            Some(image) if !image.is_empty() && self.image_dir.join(image).is_file() => image,
            _ => &self.cfg.default_image,
        }
    }

    pub fn member_html(&self, member: &Member) -> String {
        let mut html = String::from("<div class=\"group-member\">\n");
        html.push_str(&format!(
            "  <img class=\"profile-img\" src=\"{}{}\" alt=\"{}\">\n",
            self.cfg.image_web_path,
            self.image_for(member),
            member.name
        ));
        match member.website.as_deref().filter(|w| !w.is_empty()) {
            Some(url) => html.push_str(&format!(
                "  <h4><a href=\"{url}\" target=\"_blank\">{}</a></h4>\n",
                member.name
            )),
            None => html.push_str(&format!("  <h4>{}</h4>\n", member.name)),
        }
        html.push_str(&format!("  <p class=\"role\">{}</p>\n", member.role));
        if member.is_alumni() {
            html.push_str(&format!("  <p class=\"status\">{}</p>\n", member.status));
        }
        if let Some(interest) = member.research_interest.as_deref().filter(|r| !r.is_empty()) {
            html.push_str(&format!("  <p class=\"interests\">{interest}</p>\n"));
        }
        html.push_str("</div>\n");
        html
    }

    pub fn render(&self, roster: &Roster<'_>, manual: Option<&str>, today: NaiveDate) -> String {
        let mut out = format!(
            "---\nlayout: page\ntitle: group\npermalink: /group/\ndescription: {}\n---\n\n",
            self.cfg.description
        );
        out.push_str(STYLE);
        out.push('\n');
        if let Some(manual) = manual {
            out.push_str(manual);
            out.push_str("\n\n");
        }
        out.push_str(&format!("*Last updated: {}*\n\n", today.format("%B %d, %Y")));

        out.push_str("## Current Group Members\n\n");
        for (role, members) in &roster.current {
            out.push_str(&format!("### {}\n\n", heading(role)));
            out.push_str("<div class=\"group-container\">\n");
            for member in members {
                out.push_str(&self.member_html(member));
            }
            out.push_str("</div>\n\n");
        }

        if !roster.alumni.is_empty() {
            out.push_str("## Alumni\n\n");
            out.push_str("<div class=\"group-container\">\n");
            for member in &roster.alumni {
                out.push_str(&self.member_html(member));
            }
            out.push_str("</div>\n");
        }
        out
    }
}

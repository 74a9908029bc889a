//! Text bodies exchanged with a remote.
//!
//! ```text
//! GET  /refs        HEAD <branch>\n  ref <branch> <sha-or-empty>\n ...
//! GET  /objects     <sha>\n ...
//! POST /update-ref  branch <name>\n old <sha-or-empty>\n new <sha>\n
//! 409 body          current <sha-or-empty>\n
//! ```

use std::collections::{BTreeMap, HashSet};

use mgit_core::{Error as CoreError, ObjectId, Repository};

use crate::error::{Result, SyncError};

/// Branch heads and HEAD target of a repository, as seen over the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteRefs {
    /// Branch HEAD names; None when the repository has no HEAD
    pub head: Option<String>,
    /// Every branch, `None` for one without commits
    pub branches: BTreeMap<String, Option<ObjectId>>,
}

impl RemoteRefs {
    /// Snapshot the refs of a local repository
    pub fn load(repo: &Repository) -> Result<Self> {
        let head = match repo.refs().current_branch() {
            Ok(branch) => Some(branch),
            Err(CoreError::HeadMissing) => None,
            Err(e) => return Err(e.into()),
        };
        let mut branches = BTreeMap::new();
        for name in repo.refs().list_branches()? {
            let id = repo.refs().branch_head(&name)?;
            branches.insert(name, id);
        }
        Ok(Self { head, branches })
    }

    /// Head commit of `branch`, None if absent or empty
    pub fn branch_head(&self, branch: &str) -> Option<ObjectId> {
        self.branches.get(branch).copied().flatten()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(head) = &self.head {
            out.push_str(&format!("HEAD {}\n", head));
        }
        for (name, id) in &self.branches {
            out.push_str(&format!("ref {} {}\n", name, hex_or_empty(id)));
        }
        out
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut refs = Self::default();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(head) = line.strip_prefix("HEAD ") {
                refs.head = Some(head.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("ref ") {
                let (name, id) = rest.split_once(' ').unwrap_or((rest, ""));
                if name.is_empty() {
                    return Err(SyncError::protocol(format!("ref line without a name: {:?}", line)));
                }
                refs.branches.insert(name.to_string(), parse_optional_id(id)?);
            } else {
                return Err(SyncError::protocol(format!("unexpected refs line: {:?}", line)));
            }
        }
        Ok(refs)
    }
}

pub fn render_object_list<'a>(ids: impl IntoIterator<Item = &'a ObjectId>) -> String {
    let mut out = String::new();
    for id in ids {
        out.push_str(&id.to_hex());
        out.push('\n');
    }
    out
}

pub fn parse_object_list(text: &str) -> Result<HashSet<ObjectId>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_id)
        .collect()
}

/// Compare-and-swap request for one branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdateRequest {
    pub branch: String,
    /// Head the caller last saw; None for a branch without commits
    pub old: Option<ObjectId>,
    pub new: ObjectId,
}

impl RefUpdateRequest {
    pub fn render(&self) -> String {
        format!(
            "branch {}\nold {}\nnew {}\n",
            self.branch,
            hex_or_empty(&self.old),
            self.new
        )
    }

    /// Every field is required; `old` may carry an empty value
    pub fn parse(text: &str) -> Result<Self> {
        let mut branch = None;
        let mut old = None;
        let mut new = None;
        for line in text.lines() {
            let (key, value) = line.split_once(' ').unwrap_or((line, ""));
            match key {
                "branch" => branch = Some(value.trim().to_string()),
                "old" => old = Some(parse_optional_id(value)?),
                "new" => new = Some(parse_id(value.trim())?),
                _ => {}
            }
        }
        match (branch, old, new) {
            (Some(branch), Some(old), Some(new)) if !branch.is_empty() => Ok(Self { branch, old, new }),
            _ => Err(SyncError::protocol("update-ref needs branch, old and new fields")),
        }
    }
}

/// Body of a 409 answer to an update-ref
pub fn render_conflict(current: &Option<ObjectId>) -> String {
    format!("current {}\n", hex_or_empty(current))
}

pub fn parse_conflict(text: &str) -> Result<Option<ObjectId>> {
    let line = text.lines().next().unwrap_or_default();
    let value = line
        .strip_prefix("current")
        .ok_or_else(|| SyncError::protocol(format!("unexpected conflict body: {:?}", text)))?;
    parse_optional_id(value)
}

fn hex_or_empty(id: &Option<ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}

fn parse_id(text: &str) -> Result<ObjectId> {
    text.parse()
        .map_err(|_| SyncError::protocol(format!("invalid object id: {:?}", text)))
}

fn parse_optional_id(text: &str) -> Result<Option<ObjectId>> {
    let text = text.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        parse_id(text).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ObjectId {
        ObjectId::new([n; 20])
    }

    #[test]
    fn test_refs_wire_format() {
        let mut refs = RemoteRefs {
            head: Some("master".into()),
            branches: BTreeMap::new(),
        };
        refs.branches.insert("master".into(), Some(id(1)));
        refs.branches.insert("empty".into(), None);

        let text = refs.render();
        assert_eq!(
            text,
            format!("HEAD master\nref empty \nref master {}\n", id(1))
        );
        let parsed = RemoteRefs::parse(&text).unwrap();
        assert_eq!(parsed, refs);
        assert_eq!(parsed.branch_head("master"), Some(id(1)));
        assert_eq!(parsed.branch_head("empty"), None);
        assert_eq!(parsed.branch_head("absent"), None);
    }

    #[test]
    fn test_refs_without_head() {
        let parsed = RemoteRefs::parse(&format!("ref dev {}\n", id(2))).unwrap();
        assert_eq!(parsed.head, None);
        assert_eq!(parsed.branch_head("dev"), Some(id(2)));
        assert!(RemoteRefs::parse("garbage\n").is_err());
        assert!(RemoteRefs::parse("ref dev nothex\n").is_err());
    }

    #[test]
    fn test_object_list() {
        let text = render_object_list(&[id(1), id(2)]);
        let parsed = parse_object_list(&text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains(&id(2)));
        assert!(parse_object_list("").unwrap().is_empty());
        assert!(parse_object_list("zz\n").is_err());
    }

    #[test]
    fn test_update_ref_body() {
        let req = RefUpdateRequest {
            branch: "master".into(),
            old: None,
            new: id(3),
        };
        let text = req.render();
        assert_eq!(text, format!("branch master\nold \nnew {}\n", id(3)));
        assert_eq!(RefUpdateRequest::parse(&text).unwrap(), req);

        assert!(RefUpdateRequest::parse("branch master\n").is_err());
        assert!(RefUpdateRequest::parse(&format!("old \nnew {}\n", id(3))).is_err());
        assert!(RefUpdateRequest::parse("branch master\nold \nnew bad\n").is_err());
    }

    #[test]
    fn test_conflict_body() {
        assert_eq!(parse_conflict(&render_conflict(&Some(id(4)))).unwrap(), Some(id(4)));
        assert_eq!(parse_conflict(&render_conflict(&None)).unwrap(), None);
        assert!(parse_conflict("nope").is_err());
    }
}

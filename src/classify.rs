use serde::{Deserialize, Serialize};

/// Artifact kinds the enricher knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Github,
    Contract,
    #[serde(alias = "dapp")]
    Link,
    Ipfs,
    Arweave,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Contract => "contract",
            Self::Link => "link",
            Self::Ipfs => "ipfs",
            Self::Arweave => "arweave",
        }
    }

    /// Ship-type label derived from the primary artifact.
    pub fn ship_type(&self) -> &'static str {
        match self {
            Self::Github => "code",
            Self::Contract => "contract",
            Self::Link => "dapp",
            Self::Ipfs | Self::Arweave => "content",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Some(Self::Github),
            "contract" => Some(Self::Contract),
            "link" | "dapp" | "dapp/link" => Some(Self::Link),
            "ipfs" => Some(Self::Ipfs),
            "arweave" => Some(Self::Arweave),
            _ => None,
        }
    }
}

fn is_contract_address(v: &str) -> bool {
    let v = v.trim();
    v.len() == 42 && v.starts_with("0x") && v[2..].chars().all(|c| c.is_ascii_hexdigit())
}

fn host_of(v: &str) -> Option<String> {
    url::Url::parse(v.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

fn is_github_url(v: &str) -> bool {
    matches!(host_of(v).as_deref(), Some("github.com") | Some("www.github.com"))
}

fn is_ipfs_ref(v: &str) -> bool {
    let t = v.trim().to_ascii_lowercase();
    t.starts_with("ipfs://") || t.contains("/ipfs/")
}

fn is_arweave_ref(v: &str) -> bool {
    let t = v.trim().to_ascii_lowercase();
    t.starts_with("ar://") || matches!(host_of(v).as_deref(), Some("arweave.net") | Some("www.arweave.net"))
}

fn is_http_url(v: &str) -> bool {
    let t = v.trim().to_ascii_lowercase();
    t.starts_with("http://") || t.starts_with("https://")
}

/// Ordered shape predicates, evaluated in fixed priority. First match wins;
/// an unmatched value falls through to `Link`.
static RULES: &[(fn(&str) -> bool, ArtifactKind)] = &[
    (is_contract_address, ArtifactKind::Contract),
    (is_github_url, ArtifactKind::Github),
    (is_ipfs_ref, ArtifactKind::Ipfs),
    (is_arweave_ref, ArtifactKind::Arweave),
    (is_http_url, ArtifactKind::Link),
];

pub fn infer_kind(value: &str) -> ArtifactKind {
    for (pred, kind) in RULES {
        if pred(value) {
            return *kind;
        }
    }
    ArtifactKind::Link
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_addresses_win() {
        assert_eq!(
            infer_kind("0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984"),
            ArtifactKind::Contract
        );
        // Wrong length or non-hex falls through.
        assert_ne!(infer_kind("0x1234"), ArtifactKind::Contract);
        assert_ne!(
            infer_kind("0xZZ9840a85d5aF5bf1D1762F925BDADdC4201F984"),
            ArtifactKind::Contract
        );
    }

    #[test]
    fn github_urls() {
        assert_eq!(
            infer_kind("https://github.com/octocat/Hello-World"),
            ArtifactKind::Github
        );
        assert_eq!(
            infer_kind("https://www.github.com/octocat/Hello-World"),
            ArtifactKind::Github
        );
        // Lookalike hosts are links, not github.
        assert_eq!(
            infer_kind("https://github.com.evil.example/x"),
            ArtifactKind::Link
        );
    }

    #[test]
    fn ipfs_takes_priority_over_plain_http() {
        assert_eq!(infer_kind("ipfs://QmTzQ1NT"), ArtifactKind::Ipfs);
        assert_eq!(
            infer_kind("https://gateway.pinata.cloud/ipfs/QmTzQ1NT"),
            ArtifactKind::Ipfs
        );
    }

    #[test]
    fn arweave_refs() {
        assert_eq!(infer_kind("ar://abc123"), ArtifactKind::Arweave);
        assert_eq!(infer_kind("https://arweave.net/abc123"), ArtifactKind::Arweave);
    }

    #[test]
    fn http_defaults_to_link() {
        assert_eq!(infer_kind("https://myapp.example.com"), ArtifactKind::Link);
        assert_eq!(infer_kind("not a url at all"), ArtifactKind::Link);
    }

    #[test]
    fn parse_accepts_dapp_alias() {
        assert_eq!(ArtifactKind::parse("dapp"), Some(ArtifactKind::Link));
        assert_eq!(ArtifactKind::parse("GitHub"), Some(ArtifactKind::Github));
        assert_eq!(ArtifactKind::parse("bogus"), None);
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::classify::ArtifactKind;
use crate::transport::{FetchMethod, Transport};
use crate::url_guard::{Resolver, SafeFetcher};

/// Caller-supplied artifact metadata. Enrichment may augment this but never
/// overrides the submitted artifact type or value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArtifactMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stars: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Preview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

/// Display summary chosen from among a submission's artifacts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub title: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<Preview>,
}

/// Outcome of enriching a single artifact. Failure shows up as
/// `reachable = false` with no card; it never aborts the submission.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub reachable: bool,
    pub card: Option<Card>,
}

/// Per-kind enrichment strategies sharing one transport seam, so every
/// network-touching path is scriptable in tests.
pub struct Enricher {
    fetcher: SafeFetcher,
    transport: Arc<dyn Transport>,
    /// chain name -> JSON-RPC endpoint
    chain_rpc: HashMap<String, String>,
}

impl Enricher {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn Resolver>,
        chain_rpc: HashMap<String, String>,
    ) -> Self {
        Self {
            fetcher: SafeFetcher::new(transport.clone(), resolver),
            transport,
            chain_rpc,
        }
    }

    pub async fn enrich(
        &self,
        kind: ArtifactKind,
        value: &str,
        chain: Option<&str>,
        meta: Option<&ArtifactMeta>,
    ) -> Enrichment {
        match kind {
            ArtifactKind::Github => self.enrich_github(value).await,
            ArtifactKind::Contract => self.enrich_contract(value, chain).await,
            ArtifactKind::Link => self.enrich_link(value).await,
            // Content-addressed references: liveness probes are not
            // meaningful, so these count as reachable and the card comes
            // from caller-supplied metadata only.
            ArtifactKind::Ipfs | ArtifactKind::Arweave => Enrichment {
                reachable: true,
                card: meta.map(|m| card_from_meta(kind, value, m)),
            },
        }
    }

    async fn enrich_github(&self, value: &str) -> Enrichment {
        let Some((owner, repo)) = parse_github_repo(value) else {
            return Enrichment::default();
        };

        let api = format!("https://api.github.com/repos/{}/{}", owner, repo);
        let resp = match self.fetcher.fetch(FetchMethod::Get, &api).await {
            Ok(r) if r.is_success() => r,
            Ok(r) => {
                debug!(status = r.status, %owner, %repo, "github repo lookup failed");
                return Enrichment::default();
            }
            Err(e) => {
                debug!(error = %e, %owner, %repo, "github repo lookup unreachable");
                return Enrichment::default();
            }
        };

        let v: Value = serde_json::from_str(&resp.body).unwrap_or(Value::Null);
        let name = v
            .pointer("/full_name")
            .and_then(Value::as_str)
            .unwrap_or(value)
            .to_string();
        let description = v
            .pointer("/description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let stars = v.pointer("/stargazers_count").and_then(Value::as_u64);
        let forks = v.pointer("/forks_count").and_then(Value::as_u64);
        let language = v.pointer("/language").and_then(Value::as_str);
        let mut avatar = v
            .pointer("/owner/avatar_url")
            .and_then(Value::as_str)
            .map(|s| s.to_string());

        // Fall back to the owner lookup for the avatar; tolerated failure.
        if avatar.is_none() {
            let user_api = format!("https://api.github.com/users/{}", owner);
            if let Ok(r) = self.fetcher.fetch(FetchMethod::Get, &user_api).await {
                if r.is_success() {
                    let u: Value = serde_json::from_str(&r.body).unwrap_or(Value::Null);
                    avatar = u
                        .pointer("/avatar_url")
                        .and_then(Value::as_str)
                        .map(|s| s.to_string());
                }
            }
        }

        let mut summary = description;
        let mut facts: Vec<String> = vec![];
        if let Some(s) = stars {
            facts.push(format!("{} stars", s));
        }
        if let Some(f) = forks {
            facts.push(format!("{} forks", f));
        }
        if let Some(l) = language {
            facts.push(l.to_string());
        }
        if !facts.is_empty() {
            if summary.is_empty() {
                summary = facts.join(", ");
            } else {
                summary = format!("{} ({})", summary, facts.join(", "));
            }
        }

        Enrichment {
            reachable: true,
            card: Some(Card {
                title: name,
                summary,
                preview: avatar.map(|a| Preview {
                    image_url: None,
                    favicon: Some(a),
                }),
            }),
        }
    }

    async fn enrich_contract(&self, address: &str, chain: Option<&str>) -> Enrichment {
        let chain = chain.unwrap_or("ethereum");
        let Some(rpc) = self.chain_rpc.get(chain) else {
            // Explicit permissive default: without a configured RPC endpoint
            // for this chain we cannot probe, so the artifact counts as
            // reachable. Logged every time so the state is visible.
            warn!(%chain, "no RPC endpoint configured; treating contract as reachable");
            return Enrichment {
                reachable: true,
                card: Some(contract_card(address, chain, false)),
            };
        };

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_getCode",
            "params": [address, "latest"],
        });

        match self.transport.post_json(rpc, &body).await {
            Ok(r) if r.is_success() => {
                let v: Value = serde_json::from_str(&r.body).unwrap_or(Value::Null);
                let code = v.pointer("/result").and_then(Value::as_str).unwrap_or("");
                // "0x" means no code at the address.
                let has_code = code.len() > 2;
                Enrichment {
                    reachable: has_code,
                    card: has_code.then(|| contract_card(address, chain, true)),
                }
            }
            Ok(r) => {
                debug!(status = r.status, %chain, "eth_getCode failed");
                Enrichment::default()
            }
            Err(e) => {
                debug!(error = %e, %chain, "eth_getCode unreachable");
                Enrichment::default()
            }
        }
    }

    async fn enrich_link(&self, value: &str) -> Enrichment {
        // HEAD probe for liveness first; some hosts reject HEAD, so a GET
        // failure is what actually decides reachability.
        let head_ok = matches!(
            self.fetcher.fetch(FetchMethod::Head, value).await,
            Ok(r) if r.is_success()
        );

        let resp = match self.fetcher.fetch(FetchMethod::Get, value).await {
            Ok(r) if r.is_success() => r,
            _ if head_ok => {
                // Alive but body not retrievable; minimal card.
                return Enrichment {
                    reachable: true,
                    card: Some(Card {
                        title: value.to_string(),
                        summary: String::new(),
                        preview: None,
                    }),
                };
            }
            _ => return Enrichment::default(),
        };

        let page = extract_page_meta(&resp.body);
        Enrichment {
            reachable: true,
            card: Some(Card {
                title: page.title.unwrap_or_else(|| value.to_string()),
                summary: page.description.unwrap_or_default(),
                preview: if page.og_image.is_some() || page.favicon.is_some() {
                    Some(Preview {
                        image_url: page.og_image,
                        favicon: page.favicon,
                    })
                } else {
                    None
                },
            }),
        }
    }
}

fn contract_card(address: &str, chain: &str, verified_probe: bool) -> Card {
    Card {
        title: format!("Contract {}", address),
        summary: if verified_probe {
            format!("Deployed on {}", chain)
        } else {
            format!("On {} (unprobed)", chain)
        },
        preview: None,
    }
}

fn card_from_meta(kind: ArtifactKind, value: &str, meta: &ArtifactMeta) -> Card {
    Card {
        title: meta
            .name
            .clone()
            .unwrap_or_else(|| format!("{} {}", kind.as_str(), value)),
        summary: meta.description.clone().unwrap_or_default(),
        preview: if meta.image.is_some() || meta.favicon.is_some() {
            Some(Preview {
                image_url: meta.image.clone(),
                favicon: meta.favicon.clone(),
            })
        } else {
            None
        },
    }
}

/// `https://github.com/<owner>/<repo>[/...]` -> (owner, repo)
pub fn parse_github_repo(value: &str) -> Option<(String, String)> {
    let url = url::Url::parse(value.trim()).ok()?;
    let mut segments = url.path_segments()?;
    let owner = segments.next()?.to_string();
    let repo = segments.next()?.trim_end_matches(".git").to_string();
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner, repo))
}

#[derive(Debug, Default, PartialEq)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub og_image: Option<String>,
    pub favicon: Option<String>,
}

/// Bounded pattern extraction of display metadata from an HTML head. This is
/// a best-effort preview, not a parser: it scans for a handful of well-known
/// tags in a size-capped body and gives up quietly on anything unusual.
pub fn extract_page_meta(html: &str) -> PageMeta {
    let lower = html.to_ascii_lowercase();

    let title = find_between(html, &lower, "<title", ">", "</title>")
        .map(|t| collapse(t))
        .filter(|t| !t.is_empty());

    let description = meta_content(html, &lower, &["name=\"description\"", "name='description'"])
        .or_else(|| meta_content(html, &lower, &["property=\"og:description\"", "property='og:description'"]));

    let og_image = meta_content(html, &lower, &["property=\"og:image\"", "property='og:image'"]);

    let favicon = link_href(html, &lower, &["rel=\"icon\"", "rel='icon'", "rel=\"shortcut icon\"", "rel='shortcut icon'"]);

    PageMeta {
        title,
        description,
        og_image,
        favicon,
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text between the end of an opening tag and a closing marker, located via
/// the lowercased copy but sliced from the original.
fn find_between<'a>(orig: &'a str, lower: &str, open: &str, open_end: &str, close: &str) -> Option<&'a str> {
    let start = lower.find(open)?;
    let after_open = start + lower[start..].find(open_end)? + open_end.len();
    let end = after_open + lower[after_open..].find(close)?;
    orig.get(after_open..end)
}

/// `content="..."` of the first `<meta ...>` carrying one of `markers`.
fn meta_content(orig: &str, lower: &str, markers: &[&str]) -> Option<String> {
    for marker in markers {
        let Some(pos) = lower.find(marker) else { continue };
        // Bound the scan to the enclosing tag.
        let tag_start = lower[..pos].rfind("<meta")?;
        let tag_end = tag_start + lower[tag_start..].find('>')?;
        let tag_lower = &lower[tag_start..tag_end];
        let tag_orig = &orig[tag_start..tag_end];
        if let Some(v) = attr_value(tag_orig, tag_lower, "content=") {
            let v = collapse(&v);
            if !v.is_empty() {
                return Some(v);
            }
        }
    }
    None
}

fn link_href(orig: &str, lower: &str, markers: &[&str]) -> Option<String> {
    for marker in markers {
        let Some(pos) = lower.find(marker) else { continue };
        let tag_start = lower[..pos].rfind("<link")?;
        let tag_end = tag_start + lower[tag_start..].find('>')?;
        if let Some(v) = attr_value(&orig[tag_start..tag_end], &lower[tag_start..tag_end], "href=") {
            if !v.is_empty() {
                return Some(v);
            }
        }
    }
    None
}

fn attr_value(tag_orig: &str, tag_lower: &str, attr: &str) -> Option<String> {
    let at = tag_lower.find(attr)? + attr.len();
    let rest = tag_orig.get(at..)?;
    let mut chars = rest.chars();
    let quote = chars.next()?;
    if quote != '"' && quote != '\'' {
        // Unquoted value: take until whitespace or tag end.
        let end = rest.find([' ', '\t', '>', '/']).unwrap_or(rest.len());
        return Some(rest[..end].to_string());
    }
    let inner = &rest[1..];
    let end = inner.find(quote)?;
    Some(inner[..end].to_string())
}

/// Display card selection: first successful enrichment matching the declared
/// primary kind, else the first successful of any kind, else a minimal card
/// from the submitted title.
pub fn select_card(
    primary: ArtifactKind,
    results: &[(ArtifactKind, Enrichment)],
    title: &str,
) -> Card {
    if let Some(card) = results
        .iter()
        .filter(|(k, e)| *k == primary && e.reachable)
        .find_map(|(_, e)| e.card.clone())
    {
        return card;
    }
    if let Some(card) = results
        .iter()
        .filter(|(_, e)| e.reachable)
        .find_map(|(_, e)| e.card.clone())
    {
        return card;
    }
    Card {
        title: title.to_string(),
        summary: String::new(),
        preview: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_github_repo_paths() {
        assert_eq!(
            parse_github_repo("https://github.com/octocat/Hello-World"),
            Some(("octocat".into(), "Hello-World".into()))
        );
        assert_eq!(
            parse_github_repo("https://github.com/octocat/Hello-World/tree/main"),
            Some(("octocat".into(), "Hello-World".into()))
        );
        assert_eq!(
            parse_github_repo("https://github.com/octocat/repo.git"),
            Some(("octocat".into(), "repo".into()))
        );
        assert_eq!(parse_github_repo("https://github.com/onlyowner"), None);
    }

    #[test]
    fn extracts_title_and_meta() {
        let html = r#"<html><head>
            <title>  My
              Dapp </title>
            <meta name="description" content="A fine dapp">
            <meta property="og:image" content="https://cdn.example.com/og.png">
            <link rel="icon" href="/favicon.ico">
        </head><body></body></html>"#;
        let m = extract_page_meta(html);
        assert_eq!(m.title.as_deref(), Some("My Dapp"));
        assert_eq!(m.description.as_deref(), Some("A fine dapp"));
        assert_eq!(m.og_image.as_deref(), Some("https://cdn.example.com/og.png"));
        assert_eq!(m.favicon.as_deref(), Some("/favicon.ico"));
    }

    #[test]
    fn missing_meta_yields_none() {
        let m = extract_page_meta("<html><body>no head</body></html>");
        assert_eq!(m, PageMeta::default());
    }

    #[test]
    fn title_attributes_survive_case_noise() {
        let html = r#"<TITLE>Loud Page</TITLE><META NAME="DESCRIPTION" CONTENT="shouty">"#;
        let m = extract_page_meta(html);
        assert_eq!(m.title.as_deref(), Some("Loud Page"));
        assert_eq!(m.description.as_deref(), Some("shouty"));
    }

    #[test]
    fn card_selection_prefers_primary_kind() {
        let link_card = Card {
            title: "link".into(),
            ..Default::default()
        };
        let gh_card = Card {
            title: "gh".into(),
            ..Default::default()
        };
        let results = vec![
            (
                ArtifactKind::Link,
                Enrichment {
                    reachable: true,
                    card: Some(link_card),
                },
            ),
            (
                ArtifactKind::Github,
                Enrichment {
                    reachable: true,
                    card: Some(gh_card),
                },
            ),
        ];
        let c = select_card(ArtifactKind::Github, &results, "fallback");
        assert_eq!(c.title, "gh");
    }

    #[test]
    fn card_selection_falls_back_to_any_then_title() {
        let results = vec![(
            ArtifactKind::Link,
            Enrichment {
                reachable: true,
                card: Some(Card {
                    title: "only".into(),
                    ..Default::default()
                }),
            },
        )];
        assert_eq!(select_card(ArtifactKind::Github, &results, "t").title, "only");

        let none: Vec<(ArtifactKind, Enrichment)> = vec![(
            ArtifactKind::Link,
            Enrichment {
                reachable: false,
                card: None,
            },
        )];
        assert_eq!(select_card(ArtifactKind::Github, &none, "my title").title, "my title");
    }
}

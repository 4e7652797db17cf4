use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::SearchConfig;
use crate::core::matcher::{self, SearchQuery};
use crate::core::parser;
use crate::core::pool;
use crate::core::progress::Reporter;
use crate::core::retry::RetryPolicy;
use crate::error::{ItemError, SourceError};
use crate::models::{Candidate, DedupKey, EntryKind, InputEntry, UrlInfo, ResolvedTarget};
use crate::sources::MediaSource;

/// 아티스트 검색 한 번에 요청하는 후보 수의 상한.
const MAX_ARTIST_POOL: usize = 50;

/// 입력 목록 전체를 해석한 결과.
#[derive(Debug, Default)]
pub struct Resolution {
    pub targets: Vec<ResolvedTarget>,
    pub failures: Vec<(Arc<InputEntry>, ItemError)>,
}

/// 입력 항목을 구체적인 다운로드 대상으로 바꾼다.
pub struct Resolver<'a> {
    source: &'a dyn MediaSource,
    search: &'a SearchConfig,
    top: usize,
    retry: RetryPolicy,
}

impl<'a> Resolver<'a> {
    pub fn new(
        source: &'a dyn MediaSource,
        search: &'a SearchConfig,
        top: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            search,
            top: top.max(1),
            retry,
        }
    }

    /// `threads`개의 동시 조회로 모든 항목을 해석한다.
    /// 대상은 입력 순서를 유지하고 `0..n` id를 받는다.
    pub fn resolve_all(
        &self,
        entries: Vec<InputEntry>,
        threads: usize,
        reporter: &Reporter,
    ) -> Resolution {
        reporter.begin_phase("Resolving", entries.len());
        let entries: Vec<Arc<InputEntry>> = entries.into_iter().map(Arc::new).collect();

        let outcomes = pool::run_queue(entries, threads, |entry| {
            let outcome = self.resolve(&entry);
            match &outcome {
                Ok(targets) => {
                    info!(line = entry.line, entry = %entry.raw, targets = targets.len(), "resolved");
                    reporter.entry_resolved(&entry, targets.len());
                }
                Err(e) => {
                    info!(line = entry.line, entry = %entry.raw, error = %e, "resolution failed");
                    reporter.entry_failed(&entry, e);
                }
            }
            (entry, outcome)
        });

        let mut resolution = Resolution::default();
        for (entry, outcome) in outcomes {
            match outcome {
                Ok(targets) => resolution.targets.extend(targets),
                Err(e) => resolution.failures.push((entry, e)),
            }
        }
        for (id, target) in resolution.targets.iter_mut().enumerate() {
            target.id = id;
        }
        resolution
    }

    /// 항목 하나를 해석한다. 대상 id는 0으로 둔다.
    pub fn resolve(&self, entry: &Arc<InputEntry>) -> Result<Vec<ResolvedTarget>, ItemError> {
        match &entry.kind {
            EntryKind::Song { artist, title } => self.resolve_song(entry, artist, title),
            EntryKind::Artist { name } => self.resolve_artist(entry, name),
            EntryKind::Url { url } => self.resolve_url(entry, url),
        }
    }

    fn resolve_song(
        &self,
        entry: &Arc<InputEntry>,
        artist: &str,
        title: &str,
    ) -> Result<Vec<ResolvedTarget>, ItemError> {
        let query = parser::build_search_query(artist, title);
        let candidates = self.search(&query, self.search.candidates)?;
        if candidates.is_empty() {
            return Err(ItemError::Resolution(format!("no search results for '{}'", query)));
        }

        let ranked = matcher::rank(
            &SearchQuery::song(artist, title),
            candidates,
            self.search.max_duration_secs,
        );
        for (score, candidate) in &ranked {
            debug!(score, title = %candidate.title, views = ?candidate.view_count, "candidate");
        }

        match ranked.into_iter().next() {
            Some((score, best)) if score >= self.search.min_score => {
                Ok(vec![build_target(entry, &best, artist, title, 1)])
            }
            Some((score, best)) => Err(ItemError::Resolution(format!(
                "best match '{}' scored {} (minimum {})",
                best.title, score, self.search.min_score
            ))),
            None => Err(ItemError::Resolution(
                "every result was too long to be a song".to_string(),
            )),
        }
    }

    fn resolve_artist(
        &self,
        entry: &Arc<InputEntry>,
        name: &str,
    ) -> Result<Vec<ResolvedTarget>, ItemError> {
        let pool_size = (self.top * 4)
            .max(self.search.candidates)
            .min(MAX_ARTIST_POOL)
            .max(self.top);
        let candidates = self.search(name, pool_size)?;
        let ranked = matcher::rank_for_artist(name, candidates, self.search.max_duration_secs);

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(self.top);
        for candidate in ranked {
            if targets.len() == self.top {
                break;
            }
            let title = matcher::title_for_artist(name, &candidate);
            if !seen.insert(DedupKey::new(name, &title)) {
                continue;
            }
            targets.push(build_target(entry, &candidate, name, &title, targets.len() + 1));
        }

        if targets.is_empty() {
            return Err(ItemError::Resolution(format!("no songs found for artist '{}'", name)));
        }
        Ok(targets)
    }

    fn resolve_url(
        &self,
        entry: &Arc<InputEntry>,
        url: &str,
    ) -> Result<Vec<ResolvedTarget>, ItemError> {
        let info = self
            .retry
            .run(
                &format!("{} inspect {}", self.source.name(), url),
                |_| self.source.inspect(url),
                SourceError::is_transient,
            )
            .map_err(|e| ItemError::Resolution(format!("cannot read '{}': {}", url, e)))?;

        match info {
            UrlInfo::Video(candidate) => {
                let (artist, title) = matcher::describe(&candidate);
                Ok(vec![build_target(entry, &candidate, &artist, &title, 1)])
            }
            UrlInfo::Playlist { title, items } => {
                if items.is_empty() {
                    return Err(ItemError::Resolution(format!(
                        "playlist '{}' has no items",
                        title.as_deref().unwrap_or(url)
                    )));
                }
                Ok(items
                    .iter()
                    .enumerate()
                    .map(|(idx, candidate)| {
                        let (artist, title) = matcher::describe(candidate);
                        build_target(entry, candidate, &artist, &title, idx + 1)
                    })
                    .collect())
            }
        }
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, ItemError> {
        self.retry
            .run(
                &format!("{} search {}", self.source.name(), query),
                |_| self.source.search(query, limit),
                SourceError::is_transient,
            )
            .map_err(|e| ItemError::Resolution(format!("search for '{}' failed: {}", query, e)))
    }
}

fn build_target(
    entry: &Arc<InputEntry>,
    candidate: &Candidate,
    artist: &str,
    title: &str,
    rank: usize,
) -> ResolvedTarget {
    ResolvedTarget {
        id: 0,
        entry: Arc::clone(entry),
        url: candidate.url.clone(),
        artist: artist.to_string(),
        title: title.to_string(),
        rank,
        album: candidate.album.clone(),
        year: candidate.year,
        thumbnail: candidate.thumbnail.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_input;
    use crate::sources::fake::FakeSource;
    use std::time::Duration;

    fn candidate(id: &str, title: &str, channel: &str, duration: f64, views: u64) -> Candidate {
        Candidate {
            url: format!("https://www.youtube.com/watch?v={}", id),
            title: title.to_string(),
            channel: Some(channel.to_string()),
            duration: Some(duration),
            view_count: Some(views),
            ..Default::default()
        }
    }

    fn entry(line: &str) -> Arc<InputEntry> {
        Arc::new(parse_input(line).entries.remove(0))
    }

    fn retry() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1))
    }

    fn mj_catalog() -> Vec<Candidate> {
        vec![
            candidate("bj", "Michael Jackson - Billie Jean (Official Video)", "Michael Jackson", 294.0, 1_500),
            candidate("th", "Michael Jackson - Thriller (Official Video)", "Michael Jackson", 820.0, 900),
            candidate("bj2", "Michael Jackson - Billie Jean (Audio)", "Michael Jackson", 294.0, 1_200),
            candidate("bi", "Michael Jackson - Beat It (Official Video)", "Michael Jackson", 298.0, 1_000),
            candidate("kar", "Billie Jean karaoke", "Sing King", 294.0, 99_000),
            candidate("sc", "Michael Jackson - Smooth Criminal", "Michael Jackson", 250.0, 400),
        ]
    }

    #[test]
    fn test_song_picks_best_candidate() {
        let source = FakeSource::new().with_search(
            "Queen Bohemian Rhapsody",
            vec![
                candidate("cover", "Bohemian Rhapsody (Piano Cover)", "Some Pianist", 370.0, 5_000_000),
                candidate("fJ9rUzIMcZQ", "Queen – Bohemian Rhapsody (Official Video Remastered)", "Queen Official", 359.0, 1_900_000_000),
            ],
        );
        let search = SearchConfig::default();
        let resolver = Resolver::new(&source, &search, 1, retry());

        let targets = resolver.resolve(&entry("Queen - Bohemian Rhapsody")).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].url, "https://www.youtube.com/watch?v=fJ9rUzIMcZQ");
        assert_eq!(targets[0].artist, "Queen");
        assert_eq!(targets[0].title, "Bohemian Rhapsody");
        assert_eq!(targets[0].rank, 1);
    }

    #[test]
    fn test_song_without_acceptable_match_fails() {
        let source = FakeSource::new().with_search(
            "Queen Bohemian Rhapsody",
            vec![candidate("cat", "Funny cats", "Cats", 200.0, 10)],
        );
        let search = SearchConfig::default();
        let resolver = Resolver::new(&source, &search, 1, retry());
        let err = resolver.resolve(&entry("Queen - Bohemian Rhapsody")).unwrap_err();
        assert!(matches!(err, ItemError::Resolution(_)));
    }

    #[test]
    fn test_song_with_no_results_fails() {
        let source = FakeSource::new();
        let search = SearchConfig::default();
        let resolver = Resolver::new(&source, &search, 1, retry());
        assert!(resolver.resolve(&entry("Nobody - Nothing")).is_err());
    }

    #[test]
    fn test_search_is_retried() {
        let source = FakeSource::new()
            .with_search("Toto Africa", vec![candidate("af", "Toto - Africa", "Toto", 295.0, 1)])
            .failing_searches(2);
        let search = SearchConfig::default();
        let resolver = Resolver::new(&source, &search, 1, retry());
        assert_eq!(resolver.resolve(&entry("Toto - Africa")).unwrap().len(), 1);
    }

    #[test]
    fn test_artist_top_three() {
        let source = FakeSource::new().with_search("Michael Jackson", mj_catalog());
        let search = SearchConfig::default();
        let resolver = Resolver::new(&source, &search, 3, retry());

        let targets = resolver.resolve(&entry("Michael Jackson")).unwrap();
        assert_eq!(targets.len(), 3);
        let ranks: Vec<_> = targets.iter().map(|t| t.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        let titles: Vec<_> = targets.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Billie Jean", "Beat It", "Thriller"]);
        let keys: HashSet<_> = targets.iter().map(|t| t.key()).collect();
        assert_eq!(keys.len(), 3);
        assert!(targets.iter().all(|t| t.artist == "Michael Jackson"));
    }

    #[test]
    fn test_artist_never_exceeds_available() {
        let source = FakeSource::new().with_search("Michael Jackson", mj_catalog());
        let search = SearchConfig::default();
        let resolver = Resolver::new(&source, &search, 10, retry());
        let targets = resolver.resolve(&entry("Michael Jackson")).unwrap();
        assert_eq!(targets.len(), 4);
    }

    #[test]
    fn test_single_video_url() {
        let url = "https://www.youtube.com/watch?v=djV11Xbc914";
        let source = FakeSource::new().with_url_info(
            url,
            UrlInfo::Video(candidate("djV11Xbc914", "a-ha - Take On Me (Official Video)", "a-ha", 225.0, 1)),
        );
        let search = SearchConfig::default();
        let resolver = Resolver::new(&source, &search, 1, retry());
        let targets = resolver.resolve(&entry(url)).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].artist, "a-ha");
        assert_eq!(targets[0].title, "Take On Me");
    }

    #[test]
    fn test_playlist_url_expands_every_item() {
        let url = "https://www.youtube.com/playlist?list=PL123";
        let items = vec![
            candidate("a", "ABBA - Dancing Queen", "ABBA", 231.0, 1),
            candidate("b", "Mamma Mia", "ABBA - Topic", 213.0, 1),
            candidate("c", "Toto - Africa", "Toto", 295.0, 1),
        ];
        let source = FakeSource::new().with_url_info(
            url,
            UrlInfo::Playlist {
                title: Some("Mix".to_string()),
                items,
            },
        );
        let search = SearchConfig::default();
        let resolver = Resolver::new(&source, &search, 1, retry());
        let targets = resolver.resolve(&entry(url)).unwrap();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[1].display_name(), "ABBA - Mamma Mia");
        assert_eq!(targets[2].rank, 3);
    }

    #[test]
    fn test_empty_playlist_fails() {
        let url = "https://www.youtube.com/playlist?list=EMPTY";
        let source = FakeSource::new().with_url_info(
            url,
            UrlInfo::Playlist {
                title: None,
                items: vec![],
            },
        );
        let search = SearchConfig::default();
        let resolver = Resolver::new(&source, &search, 1, retry());
        assert!(matches!(
            resolver.resolve(&entry(url)),
            Err(ItemError::Resolution(_))
        ));
    }

    #[test]
    fn test_resolve_all_assigns_ids_and_collects_failures() {
        let source = FakeSource::new()
            .with_search("Michael Jackson", mj_catalog())
            .with_search("Toto Africa", vec![candidate("af", "Toto - Africa", "Toto", 295.0, 1)]);
        let search = SearchConfig::default();
        let resolver = Resolver::new(&source, &search, 2, retry());
        let entries = parse_input("Michael Jackson\nNobody - Nothing\nToto - Africa\n").entries;

        let reporter = Reporter::new(false);
        let resolution = resolver.resolve_all(entries, 3, &reporter);

        let ids: Vec<_> = resolution.targets.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(resolution.targets[2].title, "Africa");
        assert_eq!(resolution.failures.len(), 1);
        assert_eq!(resolution.failures[0].0.line, 2);
        assert_eq!(reporter.summary().unresolved, 1);
    }
}

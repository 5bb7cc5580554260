//! Route matching
//!
//! A candidate either follows exactly the same path or shares both
//! endpoints. There is no geometric tolerance.

use crate::route::types::{MatchQuery, MatchResult, MatchType, RouteRecord};

/// Scores stored routes against a query. Both store backends classify
/// through this type.
pub struct MatchingEngine;

impl MatchingEngine {
    /// Score a single candidate. Returns `None` for the querying owner's
    /// own routes and for candidates that match on neither criterion.
    pub fn score(candidate: &RouteRecord, query: &MatchQuery) -> Option<MatchResult> {
        Self::classify(candidate, query).map(|kind| MatchResult::new(candidate.clone(), kind))
    }

    fn classify(candidate: &RouteRecord, query: &MatchQuery) -> Option<MatchType> {
        if candidate.owner_user_id == query.owner_user_id {
            return None;
        }

        if let Some(path) = &query.path {
            if candidate.path == *path {
                return Some(MatchType::ExactPath);
            }
        }

        match (&query.source, &query.destination) {
            (Some(source), Some(destination))
                if candidate.source == *source && candidate.destination == *destination =>
            {
                Some(MatchType::SameEndpoints)
            }
            _ => None,
        }
    }

    /// Score every candidate, drop non-matches and sort by score descending.
    /// Ties keep encounter order.
    pub fn rank<I>(candidates: I, query: &MatchQuery) -> Vec<MatchResult>
    where
        I: IntoIterator<Item = RouteRecord>,
    {
        let mut matches: Vec<MatchResult> = candidates
            .into_iter()
            .filter_map(|candidate| {
                Self::classify(&candidate, query).map(|kind| MatchResult::new(candidate, kind))
            })
            .collect();

        matches.sort_by(|a, b| b.match_score.cmp(&a.match_score));
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::types::{timestamp_now, Point, RouteDraft};
    use serde_json::Map;

    fn route(owner: &str, conn: &str, path: &[(f64, f64)]) -> RouteRecord {
        let path: Vec<Point> = path.iter().map(|&(a, b)| Point(a, b)).collect();
        RouteDraft {
            owner_user_id: owner.to_string(),
            source: path[0],
            destination: path[path.len() - 1],
            path,
            via: Vec::new(),
            extra: Map::new(),
        }
        .into_record(conn, timestamp_now())
    }

    fn kind(candidate: &RouteRecord, query: &MatchQuery) -> Option<MatchType> {
        MatchingEngine::score(candidate, query).map(|m| m.match_type)
    }

    #[test]
    fn test_exact_path_match() {
        let a = route("A", "c1", &[(0.0, 0.0), (1.0, 1.0)]);
        let query = MatchQuery::new("B").with_path(vec![Point(0.0, 0.0), Point(1.0, 1.0)]);

        let result = MatchingEngine::score(&a, &query).unwrap();
        assert_eq!(result.match_type, MatchType::ExactPath);
        assert_eq!(result.match_score, 100);
        assert_eq!(result.route, a);
    }

    #[test]
    fn test_same_endpoints_match() {
        let a = route("A", "c1", &[(0.0, 0.0), (5.0, 5.0), (1.0, 1.0)]);
        let query = MatchQuery::new("B")
            .with_path(vec![Point(0.0, 0.0), Point(9.0, 9.0), Point(1.0, 1.0)])
            .with_endpoints(Point(0.0, 0.0), Point(1.0, 1.0));

        assert_eq!(
            kind(&a, &query),
            Some(MatchType::SameEndpoints)
        );
    }

    #[test]
    fn test_own_routes_excluded() {
        let a = route("A", "c1", &[(0.0, 0.0), (1.0, 1.0)]);
        let query = MatchQuery::new("A").with_path(a.path.clone());

        assert_eq!(kind(&a, &query), None);
    }

    #[test]
    fn test_endpoints_need_both_sides() {
        let a = route("A", "c1", &[(0.0, 0.0), (5.0, 5.0), (1.0, 1.0)]);
        let mut query = MatchQuery::new("B").with_path(vec![Point(7.0, 7.0)]);
        query.source = Some(Point(0.0, 0.0));

        assert_eq!(kind(&a, &query), None);
    }

    #[test]
    fn test_missing_path_evaluates_endpoints_only() {
        let a = route("A", "c1", &[(0.0, 0.0), (1.0, 1.0)]);
        let query = MatchQuery::new("B").with_endpoints(Point(0.0, 0.0), Point(1.0, 1.0));

        assert_eq!(
            kind(&a, &query),
            Some(MatchType::SameEndpoints)
        );
    }

    #[test]
    fn test_rank_orders_by_score_and_keeps_ties_stable() {
        let endpoints_1 = route("A", "c1", &[(0.0, 0.0), (5.0, 5.0), (1.0, 1.0)]);
        let exact = route("C", "c2", &[(0.0, 0.0), (1.0, 1.0)]);
        let endpoints_2 = route("D", "c3", &[(0.0, 0.0), (6.0, 6.0), (1.0, 1.0)]);
        let unrelated = route("E", "c4", &[(3.0, 3.0), (4.0, 4.0)]);

        let query = MatchQuery::new("B")
            .with_path(vec![Point(0.0, 0.0), Point(1.0, 1.0)])
            .with_endpoints(Point(0.0, 0.0), Point(1.0, 1.0));

        let ranked = MatchingEngine::rank(
            vec![endpoints_1, exact, endpoints_2, unrelated],
            &query,
        );

        let owners: Vec<&str> = ranked.iter().map(|m| m.route.owner_user_id.as_str()).collect();
        assert_eq!(owners, vec!["C", "A", "D"]);
        assert_eq!(ranked[0].match_score, 100);
        assert_eq!(ranked[1].match_type, MatchType::SameEndpoints);
    }
}

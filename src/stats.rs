//! Derived metrics over the request log. Every function is a pure read:
//! one or more store queries, then in-memory arithmetic. Absent data
//! always yields a zero/empty result, and every division site whose
//! divisor comes from an aggregate is guarded against zero.

use serde::Serialize;

use crate::clean_url::clean_url;
use crate::error::StatsError;
use crate::store::LogStore;

/// Rows returned by the URL rankings when the caller doesn't say otherwise.
pub const DEFAULT_RANKING_LIMIT: i64 = 10;

/// Timestamp rendering for the per-URL series, ctime style.
const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

#[derive(Serialize)]
pub struct SlowUrl {
    pub average_render_time: f64,
    pub url: String,
    pub pretty_url: String,
}

#[derive(Serialize)]
pub struct ResponsePoint {
    pub timestamp: String,
    pub render_time: f64,
}

#[derive(Serialize)]
pub struct MemoryConsumer {
    pub url: String,
    pub pretty_url: String,
    pub percent_memory_used: f64,
}

/// Total number of logged requests.
pub async fn count_requests(store: &LogStore) -> Result<i64, StatsError> {
    Ok(store.count().await?)
}

/// Whole seconds between the first and last logged request. Sub-second
/// precision is deliberately truncated, not rounded.
pub async fn total_access_span(store: &LogStore) -> Result<i64, StatsError> {
    let span = match store.access_time_bounds().await? {
        Some((first, last)) => (last - first).num_seconds(),
        None => 0,
    };
    Ok(span)
}

/// Requests served per second over the observed span. An empty or
/// single-instant log yields 0, not infinity.
pub async fn requests_per_second(store: &LogStore) -> Result<f64, StatsError> {
    let total_time = total_access_span(store).await?;
    if total_time == 0 {
        return Ok(0.0);
    }
    let num_requests = count_requests(store).await?;
    Ok(num_requests as f64 / total_time as f64)
}

/// Mean render (publisher) time across all requests.
pub async fn average_time_per_request(store: &LogStore) -> Result<f64, StatsError> {
    let total_rendering_time = store.sum_render_time().await?;
    if total_rendering_time == 0.0 {
        return Ok(0.0);
    }
    let num_requests = count_requests(store).await?;
    Ok(total_rendering_time / num_requests as f64)
}

/// Theoretical request rate the server could sustain, derived from the
/// capacity the observed span would allow at the average render time.
pub async fn optimal_requests_per_second(store: &LogStore) -> Result<f64, StatsError> {
    let time_per_request = average_time_per_request(store).await?;
    if time_per_request == 0.0 {
        return Ok(0.0);
    }
    let total_time = total_access_span(store).await?;
    if total_time == 0 {
        return Ok(0.0);
    }
    let optimal_capacity = total_time as f64 * (1.0 / time_per_request);
    Ok(optimal_capacity / total_time as f64)
}

/// Observed throughput as a percentage of the optimal rate.
pub async fn current_capacity_percent(store: &LogStore) -> Result<f64, StatsError> {
    let optimal_requests = optimal_requests_per_second(store).await?;
    if optimal_requests == 0.0 {
        return Ok(0.0);
    }
    Ok((requests_per_second(store).await? / optimal_requests) * 100.0)
}

/// The `limit` slowest URLs by average render time, slowest first.
pub async fn top_slowest_urls(store: &LogStore, limit: i64) -> Result<Vec<SlowUrl>, StatsError> {
    let rows = store.slowest_urls(limit).await?;
    rows.into_iter()
        .map(|(average_render_time, url)| {
            let pretty_url = clean_url(&url)?;
            Ok(SlowUrl {
                average_render_time,
                url,
                pretty_url,
            })
        })
        .collect()
}

/// Every logged response for one URL, oldest first, with a readable
/// timestamp. An unknown URL yields an empty series.
pub async fn response_time_series(
    store: &LogStore,
    url: &str,
) -> Result<Vec<ResponsePoint>, StatsError> {
    let rows = store.response_times(url).await?;
    Ok(rows
        .into_iter()
        .map(|(access_time, render_time)| ResponsePoint {
            timestamp: access_time.format(TIMESTAMP_FORMAT).to_string(),
            render_time,
        })
        .collect())
}

/// Summed render time spent serving one URL.
pub async fn total_render_time(store: &LogStore, url: &str) -> Result<f64, StatsError> {
    Ok(store.sum_render_time_for_url(url).await?)
}

/// How many times one URL was requested.
pub async fn hit_count(store: &LogStore, url: &str) -> Result<i64, StatsError> {
    Ok(store.count_for_url(url).await?)
}

/// The `limit` largest per-request memory deltas, attributed as a share
/// of the total delta across all requests. A zero total (empty log, or
/// deltas cancelling out) attributes 0% to every entry instead of
/// dividing by zero.
pub async fn top_memory_consumers(
    store: &LogStore,
    limit: i64,
) -> Result<Vec<MemoryConsumer>, StatsError> {
    let rows = store.memory_deltas(limit).await?;
    let total_ram = store.sum_memory_delta().await?;
    rows.into_iter()
        .map(|(url, memory_used)| {
            let percent_memory_used = if total_ram == 0.0 {
                0.0
            } else {
                (memory_used / total_ram) * 100.0
            };
            let pretty_url = clean_url(&url)?;
            Ok(MemoryConsumer {
                url,
                pretty_url,
                percent_memory_used,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{memory_store, record};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs_past_noon: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + chrono::Duration::seconds(secs_past_noon.into())
    }

    #[tokio::test]
    async fn empty_store_yields_zeros_and_empty_rankings() {
        let store = memory_store().await;
        assert_eq!(count_requests(&store).await.unwrap(), 0);
        assert_eq!(total_access_span(&store).await.unwrap(), 0);
        assert_eq!(requests_per_second(&store).await.unwrap(), 0.0);
        assert_eq!(average_time_per_request(&store).await.unwrap(), 0.0);
        assert_eq!(optimal_requests_per_second(&store).await.unwrap(), 0.0);
        assert_eq!(current_capacity_percent(&store).await.unwrap(), 0.0);
        assert!(
            top_slowest_urls(&store, DEFAULT_RANKING_LIMIT)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(
            top_memory_consumers(&store, DEFAULT_RANKING_LIMIT)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn span_is_truncated_whole_seconds() {
        let store = memory_store().await;
        store
            .insert(&record(at(0), "/a", 1.0, 0.0, 0.0))
            .await
            .unwrap();
        store
            .insert(&record(at(10), "/a", 1.0, 0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(total_access_span(&store).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn single_instant_log_has_zero_throughput() {
        let store = memory_store().await;
        store
            .insert(&record(at(0), "/a", 1.0, 0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(total_access_span(&store).await.unwrap(), 0);
        assert_eq!(requests_per_second(&store).await.unwrap(), 0.0);
        // avg render time is nonzero but the span guard still applies
        assert_eq!(optimal_requests_per_second(&store).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn throughput_and_capacity_derivation() {
        let store = memory_store().await;
        store
            .insert(&record(at(0), "/a", 2.0, 0.0, 0.0))
            .await
            .unwrap();
        store
            .insert(&record(at(10), "/b", 2.0, 0.0, 0.0))
            .await
            .unwrap();

        // 2 requests over 10s, 2.0s average render time
        assert_eq!(requests_per_second(&store).await.unwrap(), 0.2);
        assert_eq!(average_time_per_request(&store).await.unwrap(), 2.0);
        assert_eq!(optimal_requests_per_second(&store).await.unwrap(), 0.5);
        assert_eq!(current_capacity_percent(&store).await.unwrap(), 40.0);
    }

    #[tokio::test]
    async fn throughput_grows_with_count_and_shrinks_with_span() {
        let store = memory_store().await;
        store
            .insert(&record(at(0), "/a", 1.0, 0.0, 0.0))
            .await
            .unwrap();
        store
            .insert(&record(at(10), "/a", 1.0, 0.0, 0.0))
            .await
            .unwrap();
        let before = requests_per_second(&store).await.unwrap();

        // extra request inside the same span raises throughput
        store
            .insert(&record(at(5), "/b", 1.0, 0.0, 0.0))
            .await
            .unwrap();
        let with_more_requests = requests_per_second(&store).await.unwrap();
        assert!(with_more_requests > before);

        // stretching the span with the same count lowers it again
        store
            .insert(&record(at(60), "/b", 1.0, 0.0, 0.0))
            .await
            .unwrap();
        let with_longer_span = requests_per_second(&store).await.unwrap();
        assert!(with_longer_span < with_more_requests);
    }

    #[tokio::test]
    async fn slowest_urls_average_per_group_and_order_descending() {
        let store = memory_store().await;
        store
            .insert(&record(at(0), "/slow", 2.0, 0.0, 0.0))
            .await
            .unwrap();
        store
            .insert(&record(at(1), "/slow", 4.0, 0.0, 0.0))
            .await
            .unwrap();
        store
            .insert(&record(at(2), "/fast", 0.5, 0.0, 0.0))
            .await
            .unwrap();

        let ranking = top_slowest_urls(&store, DEFAULT_RANKING_LIMIT).await.unwrap();
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].url, "/slow");
        assert_eq!(ranking[0].average_render_time, 3.0);
        assert_eq!(ranking[0].pretty_url, "/slow");
        assert_eq!(ranking[1].url, "/fast");
    }

    #[tokio::test]
    async fn slowest_urls_respects_limit() {
        let store = memory_store().await;
        for (i, url) in ["/a", "/b", "/c"].iter().enumerate() {
            store
                .insert(&record(at(i as u32), url, 1.0 + i as f64, 0.0, 0.0))
                .await
                .unwrap();
        }
        let ranking = top_slowest_urls(&store, 2).await.unwrap();
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].url, "/c");
    }

    #[tokio::test]
    async fn slowest_urls_pretty_print_virtual_host_wrapping() {
        let store = memory_store().await;
        store
            .insert(&record(
                at(0),
                "/VirtualHostBase/https/example.com:443/app/VirtualHostRoot/",
                1.0,
                0.0,
                0.0,
            ))
            .await
            .unwrap();
        let ranking = top_slowest_urls(&store, DEFAULT_RANKING_LIMIT).await.unwrap();
        assert_eq!(ranking[0].pretty_url, "https://example.com/");
    }

    #[tokio::test]
    async fn response_series_is_ordered_with_readable_timestamps() {
        let store = memory_store().await;
        store
            .insert(&record(at(30), "/a", 2.5, 0.0, 0.0))
            .await
            .unwrap();
        store
            .insert(&record(at(0), "/a", 1.5, 0.0, 0.0))
            .await
            .unwrap();
        store
            .insert(&record(at(10), "/other", 9.0, 0.0, 0.0))
            .await
            .unwrap();

        let series = response_time_series(&store, "/a").await.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].render_time, 1.5);
        assert_eq!(series[0].timestamp, "Wed May  1 12:00:00 2024");
        assert_eq!(series[1].render_time, 2.5);

        assert!(response_time_series(&store, "/missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn per_url_totals_and_hits() {
        let store = memory_store().await;
        store
            .insert(&record(at(0), "/a", 1.5, 0.0, 0.0))
            .await
            .unwrap();
        store
            .insert(&record(at(1), "/a", 2.5, 0.0, 0.0))
            .await
            .unwrap();

        assert_eq!(total_render_time(&store, "/a").await.unwrap(), 4.0);
        assert_eq!(hit_count(&store, "/a").await.unwrap(), 2);
        assert_eq!(total_render_time(&store, "/missing").await.unwrap(), 0.0);
        assert_eq!(hit_count(&store, "/missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn memory_ranking_orders_deltas_and_attributes_shares() {
        let store = memory_store().await;
        // deltas -10, 0, +50; total 40
        store
            .insert(&record(at(0), "/shrank", 1.0, 110.0, 100.0))
            .await
            .unwrap();
        store
            .insert(&record(at(1), "/flat", 1.0, 100.0, 100.0))
            .await
            .unwrap();
        store
            .insert(&record(at(2), "/hog", 1.0, 100.0, 150.0))
            .await
            .unwrap();

        let ranking = top_memory_consumers(&store, DEFAULT_RANKING_LIMIT).await.unwrap();
        assert_eq!(ranking.len(), 3);
        assert_eq!(ranking[0].url, "/hog");
        assert_eq!(ranking[0].percent_memory_used, 125.0);
        assert_eq!(ranking[1].url, "/flat");
        assert_eq!(ranking[1].percent_memory_used, 0.0);
        assert_eq!(ranking[2].url, "/shrank");
        assert_eq!(ranking[2].percent_memory_used, -25.0);
    }

    #[tokio::test]
    async fn memory_ranking_guards_zero_total_delta() {
        let store = memory_store().await;
        // deltas +20 and -20 cancel out
        store
            .insert(&record(at(0), "/up", 1.0, 100.0, 120.0))
            .await
            .unwrap();
        store
            .insert(&record(at(1), "/down", 1.0, 120.0, 100.0))
            .await
            .unwrap();

        let ranking = top_memory_consumers(&store, DEFAULT_RANKING_LIMIT).await.unwrap();
        assert_eq!(ranking.len(), 2);
        assert!(ranking.iter().all(|r| r.percent_memory_used == 0.0));
    }

    #[tokio::test]
    async fn metrics_are_idempotent_reads() {
        let store = memory_store().await;
        store
            .insert(&record(at(0), "/a", 1.0, 100.0, 130.0))
            .await
            .unwrap();
        store
            .insert(&record(at(7), "/b", 3.0, 100.0, 105.0))
            .await
            .unwrap();

        assert_eq!(
            requests_per_second(&store).await.unwrap(),
            requests_per_second(&store).await.unwrap()
        );
        assert_eq!(
            current_capacity_percent(&store).await.unwrap(),
            current_capacity_percent(&store).await.unwrap()
        );
        let a = top_memory_consumers(&store, DEFAULT_RANKING_LIMIT).await.unwrap();
        let b = top_memory_consumers(&store, DEFAULT_RANKING_LIMIT).await.unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.url, y.url);
            assert_eq!(x.percent_memory_used, y.percent_memory_used);
        }
    }
}

mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;
    use stampede::prelude::*;
    use std::time::Duration;

    #[tokio::test]
    async fn soak_passes_generous_thresholds() {
        init().await;

        let iteration = PagePlan::new(["/", "/sample-page/", "/category/uncategorized/"])
            .base_url(MOCK_URL)
            .build()
            .unwrap();

        let result = Harness::new("soak", iteration)
            .stage(Duration::from_secs(1), 10)
            .stage(Duration::from_secs(2), 10)
            .threshold(ITERATION_DURATION, "p(50)<500")
            .threshold(ITERATION_DURATION, "p(95)<1000")
            .threshold(ITERATION_DURATION, "max<5000")
            .await
            .unwrap();

        assert!(result.pass, "{result}");
        assert_eq!(result.exit_code(), 0);
        assert!(result.snapshot.success > 0);
        assert_eq!(result.snapshot.error, 0);
    }

    #[tokio::test]
    async fn slow_page_fails_tight_threshold() {
        init().await;

        let iteration = PagePlan::new(["/delay/ms/100"])
            .base_url(MOCK_URL)
            .build()
            .unwrap();

        let result = Harness::new("too_slow", iteration)
            .stage(Duration::from_secs(1), 3)
            .threshold(ITERATION_DURATION, "max<10")
            .await
            .unwrap();

        assert!(!result.pass, "{result}");
        assert_eq!(result.exit_code(), 1);
        assert!(result.outcomes[0].observed.unwrap() >= 100.);
    }

    #[tokio::test]
    async fn single_user_round_robin_covers_pages_evenly() {
        init().await;

        // Paths unique to this test so concurrent tests can't skew counts.
        let pages = ["/rr/alpha/", "/rr/beta/", "/rr/gamma/"];
        let iteration = PagePlan::new(pages).base_url(MOCK_URL).build().unwrap();

        let result = Harness::new("round_robin", iteration)
            .stage(Duration::from_millis(1_500), 1)
            .await
            .unwrap();

        assert!(result.snapshot.success > pages.len() as u64);

        let counts: Vec<u64> = pages.iter().map(|p| mock_service::hit_count(p)).collect();
        let max = *counts.iter().max().unwrap();
        let min = *counts.iter().min().unwrap();
        assert!(
            max - min <= 1,
            "uneven round-robin coverage: {counts:?}"
        );
    }

    #[tokio::test]
    async fn missing_pages_are_failed_samples_not_crashes() {
        init().await;

        let iteration = PagePlan::new(["/missing/page/"])
            .base_url(MOCK_URL)
            .build()
            .unwrap();

        let result = Harness::new("missing", iteration)
            .stage(Duration::from_millis(500), 2)
            .threshold(ITERATION_DURATION, "p(95)<5000")
            .await
            .unwrap();

        // Every iteration 404s: errors are data, the timing threshold still
        // sees the (fast) durations.
        assert!(result.snapshot.error > 0);
        assert_eq!(result.snapshot.success, 0);
        assert!(result.pass, "{result}");
    }

    #[tokio::test]
    async fn cache_buster_cookie_bypasses_cache() -> anyhow::Result<()> {
        init().await;

        let client = reqwest::Client::new();

        let res = client
            .get(format!("{MOCK_URL}/sample-page/"))
            .header(reqwest::header::COOKIE, "wordpress_logged_in=")
            .send()
            .await?;
        assert_eq!(res.headers()["x-mock-cache"], "BYPASS");

        let res = client.get(format!("{MOCK_URL}/sample-page/")).send().await?;
        assert_eq!(res.headers()["x-mock-cache"], "HIT");
        Ok(())
    }

    #[tokio::test]
    async fn collapsing_backend_shows_up_as_error_rate() {
        init().await;

        let iteration = PagePlan::new(["/limited/50"])
            .base_url(MOCK_URL)
            .build()
            .unwrap();

        let result = Harness::new("limited", iteration)
            .stage(Duration::from_secs(2), 20)
            .await
            .unwrap();

        // 20 VUs against a 50 rps budget: some requests must have 500'd.
        assert!(result.snapshot.error > 0, "{result}");
        assert!(result.snapshot.error_rate() > 0.);
    }
}

//! Integration tests for cursor pagination: walking every page must yield
//! exactly the rows of one unpaginated query, in the same order.

use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use newsdesk::search::{Direction, SearchEngine, SearchRequest, SortKey};
use newsdesk::storage::{Database, NewArticle};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()
}

fn article(slug: &str, source: &str, minutes: i64, views: i64) -> NewArticle {
    NewArticle {
        interest_id: None,
        source: source.to_string(),
        original_link: format!("https://news.example.com/{slug}"),
        title: format!("Story {slug}"),
        summary: String::new(),
        publish_date: base_time() + Duration::minutes(minutes),
        view_count: views,
    }
}

/// Follow `nextCursor`/`nextAfter` until the last page
async fn walk(engine: &SearchEngine, request: &SearchRequest) -> Vec<Uuid> {
    let mut request = request.clone();
    let mut ids = Vec::new();
    loop {
        let page = engine.search(&request).await.unwrap();
        assert!(page.items.len() <= request.effective_limit() as usize);
        ids.extend(page.items.iter().map(|a| a.id));
        if !page.has_next {
            assert!(page.next_cursor.is_none());
            return ids;
        }
        request.cursor = page.next_cursor;
        request.after = page.next_after;
    }
}

async fn unpaginated(engine: &SearchEngine, request: &SearchRequest) -> Vec<Uuid> {
    let request = SearchRequest {
        limit: Some(100),
        cursor: None,
        after: None,
        ..request.clone()
    };
    let page = engine.search(&request).await.unwrap();
    assert!(!page.has_next);
    page.items.iter().map(|a| a.id).collect()
}

async fn seeded() -> (Database, SearchEngine) {
    let db = Database::open(":memory:").await.unwrap();
    let rows: Vec<NewArticle> = (0..12)
        .map(|i| {
            // Repeating minutes and view counts force id tie-breaks
            let source = if i % 3 == 0 { "Chosun" } else { "Naver" };
            article(&format!("s{i}"), source, (i / 2) * 10, i % 4)
        })
        .collect();
    db.insert_articles(&rows).await.unwrap();

    let ids: Vec<Uuid> = SearchEngine::new(db.clone())
        .search(&SearchRequest {
            limit: Some(100),
            ..SearchRequest::default()
        })
        .await
        .unwrap()
        .items
        .iter()
        .map(|a| a.id)
        .collect();
    for (n, id) in ids.iter().enumerate() {
        db.adjust_comment_count(*id, (n % 3) as i64).await.unwrap();
    }

    let engine = SearchEngine::new(db.clone());
    (db, engine)
}

#[tokio::test]
async fn test_pages_concatenate_to_unpaginated_result() {
    let (_db, engine) = seeded().await;

    for order_by in [SortKey::PublishDate, SortKey::ViewCount, SortKey::CommentCount] {
        for direction in [Direction::Asc, Direction::Desc] {
            let request = SearchRequest {
                order_by,
                direction: Some(direction),
                limit: Some(5),
                ..SearchRequest::default()
            };
            let full = unpaginated(&engine, &request).await;
            assert_eq!(full.len(), 12);
            assert_eq!(
                walk(&engine, &request).await,
                full,
                "{order_by} {direction:?} pages diverged"
            );
        }
    }
}

#[tokio::test]
async fn test_equal_publish_dates_break_ties_by_id() {
    let db = Database::open(":memory:").await.unwrap();
    let rows: Vec<NewArticle> = (0..5)
        .map(|i| article(&format!("t{i}"), "Naver", 0, 0))
        .collect();
    db.insert_articles(&rows).await.unwrap();
    let engine = SearchEngine::new(db);

    let request = SearchRequest {
        direction: Some(Direction::Desc),
        limit: Some(1),
        ..SearchRequest::default()
    };
    let walked = walk(&engine, &request).await;

    let mut expected = walked.clone();
    expected.sort_by(|a, b| b.to_string().cmp(&a.to_string()));
    assert_eq!(walked, expected);
    assert_eq!(walk(&engine, &request).await, walked);
}

#[tokio::test]
async fn test_source_filter_desc_limit_two() {
    let db = Database::open(":memory:").await.unwrap();
    let mut rows: Vec<NewArticle> = (0..5)
        .map(|i| article(&format!("n{i}"), "Naver", i, 0))
        .collect();
    rows.push(article("other", "Chosun", 100, 0));
    db.insert_articles(&rows).await.unwrap();
    let engine = SearchEngine::new(db);

    let request = SearchRequest {
        source_in: vec!["Naver".to_string()],
        order_by: SortKey::PublishDate,
        direction: Some(Direction::Desc),
        limit: Some(2),
        ..SearchRequest::default()
    };

    let first = engine.search(&request).await.unwrap();
    assert_eq!(first.items.len(), 2);
    assert!(first.has_next);
    let titles: Vec<&str> = first.items.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Story n4", "Story n3"]);

    let second = engine
        .search(&SearchRequest {
            cursor: first.next_cursor.clone(),
            after: first.next_after.clone(),
            ..request.clone()
        })
        .await
        .unwrap();
    let titles: Vec<&str> = second.items.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Story n2", "Story n1"]);
    assert!(second.has_next);

    assert_eq!(engine.count(&request).await.unwrap(), 5);
}

#[tokio::test]
async fn test_soft_deleted_rows_never_appear() {
    let (db, engine) = seeded().await;
    let request = SearchRequest {
        limit: Some(4),
        ..SearchRequest::default()
    };
    let victim = unpaginated(&engine, &request).await[3];
    db.soft_delete_article(victim).await.unwrap();

    let walked = walk(&engine, &request).await;
    assert_eq!(walked.len(), 11);
    assert!(!walked.contains(&victim));
    assert_eq!(engine.count(&request).await.unwrap(), 11);
}

#[tokio::test]
async fn test_view_count_pages_with_cursor_alone() {
    let db = Database::open(":memory:").await.unwrap();
    // Separate inserts a few ms apart so ids ascend with view counts
    for views in 0..5 {
        db.insert_articles(&[article(&format!("v{views}"), "Naver", views, views)])
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(3)).await;
    }
    let engine = SearchEngine::new(db);

    let mut request = SearchRequest {
        order_by: SortKey::ViewCount,
        direction: Some(Direction::Desc),
        limit: Some(2),
        ..SearchRequest::default()
    };
    let mut seen = Vec::new();
    loop {
        let page = engine.search(&request).await.unwrap();
        seen.extend(page.items.iter().map(|a| a.view_count));
        if !page.has_next {
            break;
        }
        request.cursor = page.next_cursor;
        request.after = None;
    }

    assert_eq!(seen, vec![4, 3, 2, 1, 0]);
}

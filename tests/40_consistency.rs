mod common;

use anyhow::Result;
use futures::future::join_all;
use reqwest::StatusCode;
use serde_json::json;

use cafe_directory::database::FaultPoint;

#[tokio::test]
async fn persistent_conflict_surfaces_as_unavailable_and_writes_nothing() -> Result<()> {
    let server = common::TestServer::start().await?;
    let (user_id, token) = server.signup("u1@example.com").await?;
    server.store.inject_fault(FaultPoint::LinkOwner, 100);

    let res = server
        .client
        .post(server.url("/api/cafes"))
        .bearer_auth(&token)
        .json(&common::cafe_body("A"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    server.store.clear_faults();
    assert!(server.store.all_cafes().await.is_empty());
    assert!(server.owned_cafes(&user_id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn single_conflict_is_retried_transparently() -> Result<()> {
    let server = common::TestServer::start().await?;
    let (user_id, token) = server.signup("u1@example.com").await?;
    server.store.inject_fault(FaultPoint::Commit, 1);

    let cafe = server.create_cafe(&token, "A").await?;

    assert_eq!(server.owned_cafes(&user_id).await?, vec![cafe["id"].as_str().unwrap().to_string()]);
    assert_eq!(server.store.all_cafes().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_delete_leaves_both_sides_intact() -> Result<()> {
    let server = common::TestServer::start().await?;
    let (user_id, token) = server.signup("u1@example.com").await?;
    let cafe = server.create_cafe(&token, "A").await?;
    let id = cafe["id"].as_str().unwrap().to_string();
    server.store.inject_fault(FaultPoint::UnlinkOwner, 100);

    let res = server
        .client
        .delete(server.url(&format!("/api/cafes/{}", id)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    server.store.clear_faults();
    assert_eq!(server.owned_cafes(&user_id).await?, vec![id.clone()]);
    assert_eq!(server.store.all_cafes().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_ratings_are_all_recorded() -> Result<()> {
    let server = common::TestServer::start().await?;
    let (_, token) = server.signup("u1@example.com").await?;
    let cafe = server.create_cafe(&token, "A").await?;
    let path = server.url(&format!("/api/cafes/rating/{}", cafe["id"].as_str().unwrap()));

    let requests = (0..20).map(|i| {
        server
            .client
            .post(&path)
            .bearer_auth(&token)
            .json(&json!({ "overallRating": i % 5 }))
            .send()
    });
    for res in join_all(requests).await {
        assert_eq!(res?.status(), StatusCode::CREATED);
    }

    let stored = server.store.all_cafes().await;
    assert_eq!(stored[0].overall_rating.len(), 20);
    Ok(())
}

#[tokio::test]
async fn concurrent_creates_and_deletes_keep_owned_set_exact() -> Result<()> {
    let server = common::TestServer::start().await?;
    let (user_id, token) = server.signup("u1@example.com").await?;

    let names: Vec<String> = (0..8).map(|i| format!("Cafe {}", i)).collect();
    let creates = names.iter().map(|name| server.create_cafe(&token, name));
    let created: Vec<_> = join_all(creates).await.into_iter().collect::<Result<_>>()?;

    let deletes = created.iter().step_by(2).map(|cafe| {
        server
            .client
            .delete(server.url(&format!("/api/cafes/{}", cafe["id"].as_str().unwrap())))
            .bearer_auth(&token)
            .send()
    });
    for res in join_all(deletes).await {
        assert_eq!(res?.status(), StatusCode::OK);
    }

    let mut owned = server.owned_cafes(&user_id).await?;
    let mut remaining: Vec<String> = server
        .store
        .all_cafes()
        .await
        .into_iter()
        .map(|c| c.id.to_string())
        .collect();
    owned.sort();
    remaining.sort();

    assert_eq!(owned.len(), 4);
    assert_eq!(owned, remaining);
    Ok(())
}

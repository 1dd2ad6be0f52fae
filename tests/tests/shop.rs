mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;
    use axum::{routing::post, Router};
    use mock_service::ServiceConfig;
    use reqwest::StatusCode;
    use shopstress::shop::*;

    #[tokio::test]
    async fn auth_returns_token() -> anyhow::Result<()> {
        let client = shop(ServiceConfig::default()).await?;

        let username = random_username();
        let token = client.auth(&username, DEFAULT_PASSWORD).await?;
        assert!(!token.is_empty());

        // Logging in again with the same password works, a different one does not.
        assert_eq!(client.auth(&username, DEFAULT_PASSWORD).await?, token);
        let err = client.auth(&username, "not-the-password").await.unwrap_err();
        assert!(matches!(err, ShopError::UnexpectedStatus { .. }), "{err}");
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        Ok(())
    }

    #[tokio::test]
    async fn transfer_and_buy() -> anyhow::Result<()> {
        let client = shop(ServiceConfig::default()).await?;
        let (sender, receiver) = random_username_pair();
        let sender_token = client.auth(&sender, DEFAULT_PASSWORD).await?;
        let receiver_token = client.auth(&receiver, DEFAULT_PASSWORD).await?;

        let fresh = client.info(&receiver_token).await?;
        assert_eq!(fresh.coins, 1000);
        assert!(fresh.inventory.is_empty());
        assert!(fresh.coin_history.received.is_empty());

        for _ in 0..TRANSFERS_PER_ITERATION {
            client
                .send_coin(&sender_token, &receiver, TRANSFER_AMOUNT)
                .await?;
        }

        let info = client.info(&receiver_token).await?;
        assert_eq!(info.coins, 1020);
        assert_eq!(info.coin_history.received.len(), 2);
        assert!(info
            .coin_history
            .received
            .iter()
            .all(|t| t.user == sender && t.amount == 10));

        for item in ITEMS {
            client.buy(&receiver_token, item).await?;
        }

        let info = client.info(&receiver_token).await?;
        assert_eq!(info.coins, 860);
        for item in ITEMS {
            assert_eq!(info.quantity(item), 1, "{item}");
        }

        let sender_info = client.info(&sender_token).await?;
        assert_eq!(sender_info.coins, 980);
        assert_eq!(sender_info.coin_history.sent.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn rejected_requests() -> anyhow::Result<()> {
        let client = shop(ServiceConfig::default()).await?;
        let token = client.auth("user1", DEFAULT_PASSWORD).await?;

        let err = client.buy(&token, "yacht").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));

        let err = client.send_coin(&token, "user2", 10).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));

        let err = client.info(&Token::default()).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));

        let err = client.info(&Token::new("forged")).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        Ok(())
    }

    #[tokio::test]
    async fn iteration_against_healthy_service() -> anyhow::Result<()> {
        let ctx = shop_context(ServiceConfig::default()).await?;
        assert_eq!(ctx.iteration().await, 0);

        let client = ctx.client();
        let token = client.auth("user42", DEFAULT_PASSWORD).await?;
        let sender_token = client.auth("user41", DEFAULT_PASSWORD).await?;
        assert_eq!(ctx.iteration_for("user41", "user42").await, 0);

        assert_eq!(client.info(&token).await?.coins, 860);
        assert_eq!(client.info(&sender_token).await?.coins, 980);
        Ok(())
    }

    const CHECKS_PER_ITERATION: usize = 2 + TRANSFERS_PER_ITERATION + 1 + ITEMS.len();

    #[tokio::test]
    async fn auth_with_malformed_body() -> anyhow::Result<()> {
        let client = serve(Router::new().route("/api/auth", post(|| async { "not json" }))).await?;

        let err = client.auth("user1", DEFAULT_PASSWORD).await.unwrap_err();
        assert!(matches!(err, ShopError::Decode(_)), "{err}");
        assert_eq!(err.status(), None);

        // Every later step fails against this service, but none of them is skipped.
        let ctx = ShopContext::new(client, DEFAULT_PASSWORD);
        assert_eq!(ctx.iteration().await, CHECKS_PER_ITERATION);
        Ok(())
    }

    #[tokio::test]
    async fn auth_with_empty_token() -> anyhow::Result<()> {
        let router = Router::new().route("/api/auth", post(|| async { r#"{"token":""}"# }));
        let client = serve(router).await?;

        let err = client.auth("user1", DEFAULT_PASSWORD).await.unwrap_err();
        assert!(matches!(err, ShopError::EmptyToken), "{err}");

        let ctx = ShopContext::new(client, DEFAULT_PASSWORD);
        assert_eq!(ctx.iteration().await, CHECKS_PER_ITERATION);
        Ok(())
    }
}

use anyhow::Context;
use axum::{
    Extension, Json,
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use futures::{StreamExt, stream::BoxStream};
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::api::chat_gateway::{self, ChatCompletionMessage};
use crate::core::{
    aliases::DbPool,
    app_error::AppError,
    app_state::AppState,
    middleware::{self, CurrentUser},
};
use crate::models::{CreateAiConversationEntity, MenuCategoryEntity, MenuItemEntity};
use crate::schema::{ai_conversations, menu_categories, menu_items};

/// The floating AI waiter widget. Proxies the chat history to the AI
/// gateway and re-streams the token SSE stream back to the caller,
/// terminated by the gateway's `[DONE]` sentinel.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/chat",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(chat))
            .route_layer(axum::middleware::from_fn(
                middleware::customers_authorization,
            )),
    )
}

#[derive(Deserialize, ToSchema)]
struct ChatMessageReq {
    role: String,
    content: String,
}

#[derive(Deserialize, ToSchema)]
struct ChatReq {
    session_id: String,
    messages: Vec<ChatMessageReq>,
}

/// Stream an assistant reply for the given message history.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Chat"],
    request_body = ChatReq,
    responses(
        (status = 200, description = "SSE stream of assistant tokens")
    )
)]
async fn chat(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<ChatReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.messages.is_empty() {
        return Err(AppError::BadRequest("Message history is empty".to_string()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let system_prompt = build_system_prompt(conn).await?;

    // Log the user's message up front; the streamed reply is attached once
    // the stream completes.
    let mut conversation_id: Option<Uuid> = None;
    if let Some(last) = body.messages.last() {
        if last.role == "user" {
            let conversation: crate::models::AiConversationEntity =
                diesel::insert_into(ai_conversations::table)
                    .values(CreateAiConversationEntity {
                        user_id: Some(user.id),
                        session_id: body.session_id.clone(),
                        message: last.content.clone(),
                        response: String::new(),
                    })
                    .returning(crate::models::AiConversationEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to log chat message")?;
            conversation_id = Some(conversation.id);
        }
    }

    let mut messages = Vec::with_capacity(body.messages.len() + 1);
    messages.push(ChatCompletionMessage {
        role: "system".to_string(),
        content: system_prompt,
    });
    messages.extend(body.messages.into_iter().map(|m| ChatCompletionMessage {
        role: m.role,
        content: m.content,
    }));

    let upstream =
        chat_gateway::stream_chat_completion(&state.http_client, &state.config.chat, &messages)
            .await?;

    let stream_state = ChatStreamState {
        upstream: upstream.bytes_stream().boxed(),
        collected: String::new(),
        pool: state.db_pool.clone(),
        conversation_id,
    };

    let stream = futures::stream::unfold(stream_state, |mut st| async move {
        match st.upstream.next().await {
            Some(Ok(chunk)) => {
                if let Ok(text) = std::str::from_utf8(&chunk) {
                    st.collected.push_str(&extract_stream_content(text));
                }
                Some((Ok::<Bytes, reqwest::Error>(chunk), st))
            }
            Some(Err(err)) => {
                tracing::warn!("AI gateway stream failed: {err}");
                Some((Err(err), st))
            }
            None => {
                if let Some(id) = st.conversation_id {
                    let pool = st.pool.clone();
                    let collected = std::mem::take(&mut st.collected);
                    tokio::spawn(async move {
                        if let Err(err) = persist_response(pool, id, collected).await {
                            tracing::warn!("Failed to store chat response: {err:#}");
                        }
                    });
                }
                None
            }
        }
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    ))
}

struct ChatStreamState {
    upstream: BoxStream<'static, reqwest::Result<Bytes>>,
    collected: String,
    pool: DbPool,
    conversation_id: Option<Uuid>,
}

async fn build_system_prompt(
    conn: &mut diesel_async::AsyncPgConnection,
) -> Result<String, AppError> {
    let rows: Vec<(MenuItemEntity, Option<MenuCategoryEntity>)> = menu_items::table
        .left_join(menu_categories::table)
        .filter(menu_items::is_available.eq(true))
        .select((
            MenuItemEntity::as_select(),
            Option::<MenuCategoryEntity>::as_select(),
        ))
        .get_results(conn)
        .await
        .context("Failed to get menu items for chat context")?;

    let menu_context = rows
        .iter()
        .map(|(item, category)| {
            let category_name = category
                .as_ref()
                .map(|c| c.name.as_str())
                .unwrap_or("Other");
            let mut line = format!("{} ({category_name}) - ₹{}", item.name, item.price);
            if let Some(description) = &item.description {
                line.push_str(&format!(" - {description}"));
            }
            if item.is_vegetarian {
                line.push_str(" [Vegetarian]");
            }
            if item.is_vegan {
                line.push_str(" [Vegan]");
            }
            if let Some(spice_level) = item.spice_level {
                line.push_str(&format!(" [Spice Level: {spice_level}/5]"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "You are the SmartServe AI Waiter for a table-ordering restaurant. \
Help diners discover dishes, answer questions about ingredients, spice \
levels and dietary fit, and explain the ordering flow. Keep replies brief \
and conversational, and always mention prices when recommending items. If \
something is not on the menu, say so and suggest the closest alternative.\n\n\
AVAILABLE MENU ITEMS:\n{menu_context}"
    ))
}

/// Pulls the incremental assistant text out of a raw SSE chunk so the full
/// reply can be stored once the stream ends.
fn extract_stream_content(chunk: &str) -> String {
    let mut content = String::new();
    for line in chunk.lines() {
        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };
        if data.trim() == "[DONE]" {
            continue;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(data) else {
            continue;
        };
        if let Some(token) = value["choices"][0]["delta"]["content"].as_str() {
            content.push_str(token);
        }
    }
    content
}

async fn persist_response(pool: DbPool, id: Uuid, response: String) -> anyhow::Result<()> {
    let conn = &mut pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;
    diesel::update(ai_conversations::table.find(id))
        .set(ai_conversations::response.eq(response))
        .execute(conn)
        .await
        .context("Failed to update chat conversation")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::extract_stream_content;

    #[test]
    fn extracts_tokens_from_sse_chunks() {
        let chunk = "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n\
data: [DONE]\n\n";
        assert_eq!(extract_stream_content(chunk), "Hello there");
    }

    #[test]
    fn ignores_malformed_lines() {
        let chunk = ": keep-alive\n\ndata: not-json\n\n";
        assert_eq!(extract_stream_content(chunk), "");
    }
}

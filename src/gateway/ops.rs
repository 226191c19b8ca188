//! Typed gateway operations and their GraphQL documents (Hasura syntax).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{FetchPolicy, GatewayClient};
use crate::errors::GatewayError;
use crate::models::{ActionReply, Conversation, CreatedChat, Message};
use crate::send::SendOps;
use crate::state::ListOps;

const GET_CHATS: &str = r#"
query GetChats($userId: uuid!) {
  chats(where: {user_id: {_eq: $userId}}, order_by: {updated_at: desc}) {
    id
    title
    created_at
    updated_at
    messages(limit: 1, order_by: {created_at: desc}) {
      content
      is_bot
    }
  }
}
"#;

const CREATE_CHAT: &str = r#"
mutation CreateChat($title: String!, $userId: uuid!) {
  insert_chats_one(object: {title: $title, user_id: $userId}) {
    id
    title
    created_at
  }
}
"#;

const DELETE_CHAT: &str = r#"
mutation DeleteChat($chatId: uuid!) {
  delete_chats_by_pk(id: $chatId) {
    id
  }
}
"#;

const INSERT_MESSAGE: &str = r#"
mutation InsertMessage($chatId: uuid!, $content: String!, $isBot: Boolean!) {
  insert_messages_one(object: {chat_id: $chatId, content: $content, is_bot: $isBot}) {
    id
    content
    is_bot
    created_at
  }
}
"#;

const SEND_MESSAGE_ACTION: &str = r#"
mutation SendMessage($chatId: uuid!, $content: String!) {
  sendMessage(chatId: $chatId, content: $content) {
    success
    message
    response
  }
}
"#;

pub(crate) const MESSAGES_SUBSCRIPTION: &str = r#"
subscription MessagesSubscription($chatId: uuid!) {
  messages(where: {chat_id: {_eq: $chatId}}, order_by: {created_at: asc}) {
    id
    content
    is_bot
    created_at
  }
}
"#;

#[derive(Deserialize)]
struct ChatsData {
    chats: Vec<Conversation>,
}

#[derive(Deserialize)]
struct CreateChatData {
    insert_chats_one: CreatedChat,
}

#[derive(Deserialize)]
struct DeletedChat {
    id: String,
}

#[derive(Deserialize)]
struct DeleteChatData {
    delete_chats_by_pk: Option<DeletedChat>,
}

#[derive(Deserialize)]
struct InsertMessageData {
    insert_messages_one: Message,
}

#[derive(Deserialize)]
struct SendMessageData {
    #[serde(rename = "sendMessage")]
    send_message: ActionReply,
}

impl GatewayClient {
    /// All conversations owned by `user_id`, most recently updated first,
    /// each with its latest-message preview.
    pub async fn fetch_conversations(
        &self,
        user_id: &str,
        policy: FetchPolicy,
    ) -> Result<Vec<Conversation>, GatewayError> {
        let data: ChatsData = self
            .query("GetChats", GET_CHATS, json!({ "userId": user_id }), policy)
            .await?;
        Ok(data.chats)
    }
}

#[async_trait(?Send)]
impl ListOps for GatewayClient {
    async fn create_conversation(
        &self,
        title: &str,
        user_id: &str,
    ) -> Result<CreatedChat, GatewayError> {
        let data: CreateChatData = self
            .mutate(CREATE_CHAT, json!({ "title": title, "userId": user_id }))
            .await?;
        Ok(data.insert_chats_one)
    }

    /// Delete a conversation; the backend cascades to its messages.
    async fn delete_conversation(&self, chat_id: &str) -> Result<String, GatewayError> {
        let data: DeleteChatData =
            self.mutate(DELETE_CHAT, json!({ "chatId": chat_id })).await?;
        match data.delete_chats_by_pk {
            Some(deleted) => Ok(deleted.id),
            // Hasura reports a permission miss or absent row as null.
            None => Err(GatewayError::GraphQl(format!("chat '{chat_id}' was not deleted"))),
        }
    }
}

#[async_trait(?Send)]
impl SendOps for GatewayClient {
    async fn insert_message(
        &self,
        chat_id: &str,
        content: &str,
        is_bot: bool,
    ) -> Result<Message, GatewayError> {
        let data: InsertMessageData = self
            .mutate(
                INSERT_MESSAGE,
                json!({ "chatId": chat_id, "content": content, "isBot": is_bot }),
            )
            .await?;
        Ok(data.insert_messages_one)
    }

    async fn generate_response(
        &self,
        chat_id: &str,
        content: &str,
    ) -> Result<ActionReply, GatewayError> {
        let data: SendMessageData = self
            .mutate(SEND_MESSAGE_ACTION, json!({ "chatId": chat_id, "content": content }))
            .await?;
        Ok(data.send_message)
    }
}

//! GraphQL-over-WebSocket wire protocol
//!
//! Message definitions for the [GraphQLOverWebSocket protocol][1], the
//! close-code vocabulary, and the codec seam that turns frames into text.
//!
//! [1]: https://github.com/graphql/graphql-over-http/blob/main/rfcs/GraphQLOverWebSocket.md

pub mod messages;

pub use messages::{
    ClientMessage, CloseCode, JsonCodec, MessageCodec, ServerMessage, SubscribePayload,
    GRAPHQL_TRANSPORT_WS_PROTOCOL, GRAPHQL_WS_PROTOCOL, SUPPORTED_PROTOCOLS,
};

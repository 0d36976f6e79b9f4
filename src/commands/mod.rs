/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes three top-level command modules:

- `serve`    — Run the HTTP API server
- `chat`     — Interactive chat against a running server
- `sessions` — Non-interactive session listing and deletion

These handlers are intentionally small and use the library components:
storage, providers, the relay, the server and the client.
*/

// Chat command handler
pub mod chat;

// Session listing and deletion
pub mod sessions;

// Server command handler
pub mod serve;

// Slash-command parser for the chat loop
pub mod special_commands;

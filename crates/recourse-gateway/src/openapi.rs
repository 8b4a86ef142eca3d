//! OpenAPI document for the gateway routes.
//!
//! Served at `/openapi.json`. Authored by hand — the document describes
//! the stable surface, it is not generated from the router.

use serde_json::{json, Value};

/// The OpenAPI 3 document for this service.
pub fn document() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Recourse v1 API",
            "version": "1.0.0",
            "description": "LLM-assisted review pipeline"
        },
        "paths": {
            "/health": {
                "get": {
                    "summary": "Liveness check",
                    "responses": {
                        "200": { "description": "Service is up" }
                    }
                }
            },
            "/v1/documents/review": {
                "post": {
                    "summary": "Review a changed document",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "required": ["file_url", "author", "revision"],
                                    "properties": {
                                        "file_url": { "type": "string" },
                                        "author": { "$ref": "#/components/schemas/Author" },
                                        "revision": { "type": "string" }
                                    }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": { "description": "Structured feedback for the document revision" },
                        "404": { "description": "The document reference does not resolve" },
                        "502": { "description": "The generation service stayed unavailable" }
                    }
                }
            },
            "/v1/stories/{id}/sync": {
                "post": {
                    "summary": "Fetch a backlog story and score it against the rubric",
                    "parameters": [{
                        "name": "id",
                        "in": "path",
                        "required": true,
                        "schema": { "type": "string" }
                    }],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "required": ["revision", "action"],
                                    "properties": {
                                        "revision": { "type": "string" },
                                        "action": {
                                            "type": "string",
                                            "enum": ["created", "updated", "deleted"]
                                        },
                                        "project": { "type": "string" }
                                    }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": { "description": "Story feedback, cached per (story, revision)" },
                        "400": { "description": "Backlog credentials are not configured" },
                        "404": { "description": "No story found for the id" },
                        "502": { "description": "The backlog or generation service stayed unavailable" }
                    }
                }
            },
            "/v1/feedback/export": {
                "post": {
                    "summary": "Write a run's accumulated feedback to a JSON file",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "required": ["run_id"],
                                    "properties": {
                                        "run_id": { "type": "string" },
                                        "path": { "type": "string", "default": "feedback.json" }
                                    }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": { "description": "Export summary (count and file path)" }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Author": {
                    "type": "string",
                    "enum": [
                        "Architect",
                        "QA",
                        "QA Engineer",
                        "Backend Engineer",
                        "Front End Engineer",
                        "User",
                        "VP of Engineering",
                        "Product Manager"
                    ]
                }
            }
        }
    })
}

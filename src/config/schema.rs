use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "tools": {
                "type": "object",
                "properties": {
                    "directory": { "type": "string" },
                    "wordlist": { "$ref": "#/$defs/tool" },
                    "enumerator": { "$ref": "#/$defs/tool" },
                    "scanner": { "$ref": "#/$defs/tool" }
                }
            },
            "wordlist": {
                "type": "object",
                "properties": {
                    "depth": { "type": "integer", "minimum": 0 },
                    "min_word_length": { "type": "integer", "minimum": 1 }
                }
            },
            "enumeration": {
                "type": "object",
                "properties": {
                    "threads": { "type": "integer", "minimum": 1 },
                    "extensions": { "type": "array", "items": { "type": "string" } }
                }
            },
            "service": {
                "type": "object",
                "properties": {
                    "url": { "type": "string", "format": "uri" },
                    "data": { "type": "string" },
                    "concurrency": { "type": "integer", "minimum": 1 },
                    "autostart": { "type": "boolean" },
                    "server_command": { "$ref": "#/$defs/argv" }
                }
            },
            "timeouts": {
                "type": "object",
                "properties": {
                    "probe": { "type": "integer", "minimum": 1 },
                    "install": { "type": "integer", "minimum": 1 },
                    "wordlist": { "type": "integer", "minimum": 1 },
                    "enumeration": { "type": "integer", "minimum": 1 },
                    "request": { "type": "integer", "minimum": 1 },
                    "service_startup": { "type": "integer", "minimum": 1 }
                }
            },
            "output": {
                "type": "object",
                "properties": {
                    "directory": { "type": "string" }
                }
            }
        },
        "$defs": {
            "argv": {
                "type": "array",
                "minItems": 1,
                "items": { "type": "string" }
            },
            "tool": {
                "type": "object",
                "properties": {
                    "command": { "$ref": "#/$defs/argv" },
                    "probe_args": { "type": "array", "items": { "type": "string" } },
                    "archive_url": { "type": "string", "format": "uri" },
                    "install_dir": { "type": "string" },
                    "setup": { "type": "array", "items": { "$ref": "#/$defs/argv" } }
                }
            }
        }
    })
});

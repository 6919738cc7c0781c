// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Support definitions shared by all generated units: the linkage
/// macro, the allocator interface with its arena and heap
/// implementations, and helpers over the `jsp` and `jsb` contexts.
const SUPPORT: &str = r#"#ifndef JSGEN_SUPPORT_H
#define JSGEN_SUPPORT_H

#include <stdbool.h>
#include <stddef.h>
#include <stdint.h>
#include <stdlib.h>
#include <string.h>

#ifndef JSGEN_DEF
#define JSGEN_DEF static inline
#endif

#define JSGEN_ERR_ALLOC (-2)
#define JSGEN_ERR_SYNTAX (-3)

typedef struct {
    void *ctx;
    void *(*alloc)(void *ctx, size_t size);
} JsGenAllocator;

JSGEN_DEF void *jsgen_malloc(JsGenAllocator *a, size_t size) {
    if (size == 0) size = 1;
    return a->alloc(a->ctx, size);
}

typedef struct {
    unsigned char *data;
    size_t capacity;
    size_t used;
} JsGenArena;

JSGEN_DEF void jsgen_arena_init(JsGenArena *arena, void *data, size_t capacity) {
    arena->data = (unsigned char *)data;
    arena->capacity = capacity;
    arena->used = 0;
}

JSGEN_DEF void *jsgen_arena_alloc(void *ctx, size_t size) {
    JsGenArena *arena = (JsGenArena *)ctx;
    uintptr_t base = (uintptr_t)arena->data;
    uintptr_t start = (base + arena->used + 15) & ~(uintptr_t)15;
    size_t offset = (size_t)(start - base);
    if (offset > arena->capacity || size > arena->capacity - offset) return NULL;
    arena->used = offset + size;
    return arena->data + offset;
}

JSGEN_DEF void jsgen_arena_reset(JsGenArena *arena) {
    arena->used = 0;
}

JSGEN_DEF JsGenAllocator jsgen_arena_allocator(JsGenArena *arena) {
    JsGenAllocator a = {arena, jsgen_arena_alloc};
    return a;
}

JSGEN_DEF void *jsgen__heap_alloc(void *ctx, size_t size) {
    (void)ctx;
    return malloc(size);
}

JSGEN_DEF JsGenAllocator jsgen_heap_allocator(void) {
    JsGenAllocator a = {NULL, jsgen__heap_alloc};
    return a;
}

JSGEN_DEF int jsgen__jsp_array_done(const Jsp *jsp) {
    size_t offset = jsp->offset;
    while (offset < jsp->length) {
        char c = jsp->buffer[offset++];
        if (c != ' ' && c != '\t' && c != '\n' && c != '\r') return c == ']';
    }
    return 1;
}

JSGEN_DEF int jsgen__jsb_raw(Jsb *jsb, const char *text, size_t len) {
    if (!jsb->is_key) return -1;
    size_t needed = jsb->buffer.count + len + 1;
    if (needed > jsb->buffer.capacity) {
        size_t capacity = jsb->buffer.capacity ? jsb->buffer.capacity : 32;
        while (capacity < needed) capacity *= 2;
        char *items = JSB_REALLOC(jsb->buffer.items, capacity);
        if (items == NULL) return -1;
        jsb->buffer.items = items;
        jsb->buffer.capacity = capacity;
    }
    memcpy(jsb->buffer.items + jsb->buffer.count, text, len);
    jsb->buffer.count += len;
    jsb->buffer.items[jsb->buffer.count] = '\0';
    jsb->is_first = false;
    jsb->is_key = false;
    return 0;
}

#endif // JSGEN_SUPPORT_H
"#;

/// Generate the file preamble: banner, include guard, runtime
/// includes and support definitions.
pub fn generate(output_name: &str, guard: &str) -> String {
    format!(
        r#"// @generated JSON routines for {output_name}
// /!\ Do not edit by hand

#ifndef {guard}
#define {guard}

#include "jsb.h"
#include "jsp.h"

{SUPPORT}"#
    )
}

/// Generate the annotations header, defining every marker and
/// attribute spelling as an empty macro.
pub fn annotations_header() -> String {
    r#"// Annotations recognized by jsgen.
// /!\ Do not edit by hand

#ifndef JSGEN_ANNOTATIONS_H
#define JSGEN_ANNOTATIONS_H

// Generate JSON parse and stringify routines.
#define JSGEN_JSON
// Generate JSON stringify routines only.
#define JSGEN_JSONS
// Generate JSON parse routines only.
#define JSGEN_JSONP
// Skip the field.
#define jsgen_ignore()
// Use the selected name as JSON key.
#define jsgen_alias(name)
// Array field counted by the selected sibling field.
#define jsgen_sized_by(name)
// Raw JSON text stored verbatim, the field type must be char *.
#define jsgen_json_literal

#ifndef JSGEN_NO_STRIP
#define JSON JSGEN_JSON
#define JSONS JSGEN_JSONS
#define JSONP JSGEN_JSONP
#define ignore jsgen_ignore
#define alias jsgen_alias
#define sized_by jsgen_sized_by
#define json_literal jsgen_json_literal
#endif // JSGEN_NO_STRIP

#endif // JSGEN_ANNOTATIONS_H
"#
    .to_owned()
}

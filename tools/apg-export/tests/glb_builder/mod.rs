//! Programmatic GLB construction for import tests.
//!
//! Builds a skinned quad (two triangles) bound to a two-bone chain, with a
//! one-second "Wave" animation that moves the tip bone up by one unit.

use serde_json::{json, Value};

/// Root rest translation
pub const ROOT_TRANSLATION: [f32; 3] = [0.0, 0.5, 0.0];

/// Tip translation keys at t = 0 and t = 1
pub const TIP_KEYS: [[f32; 3]; 2] = [[0.0, 1.0, 0.0], [0.0, 2.0, 0.0]];

struct BufferBuilder {
    data: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl BufferBuilder {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            views: Vec::new(),
            accessors: Vec::new(),
        }
    }

    /// Append bytes as a new view + accessor, returning the accessor index
    fn push(&mut self, bytes: &[u8], mut accessor: Value, target: Option<u32>) -> usize {
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        let mut view = json!({
            "buffer": 0,
            "byteOffset": self.data.len(),
            "byteLength": bytes.len(),
        });
        if let Some(target) = target {
            view["target"] = json!(target);
        }
        self.data.extend_from_slice(bytes);
        self.views.push(view);

        accessor["bufferView"] = json!(self.views.len() - 1);
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }
}

const FLOAT: u32 = 5126;
const UNSIGNED_SHORT: u32 = 5123;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Generate the skinned, animated quad as GLB bytes
pub fn generate_skinned_quad_glb() -> Vec<u8> {
    let positions: [[f32; 3]; 4] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ];
    let normals: [[f32; 3]; 4] = [[0.0, 0.0, 1.0]; 4];
    let uvs: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    let joints: [[u16; 4]; 4] = [[0, 0, 0, 0], [0, 0, 0, 0], [0, 1, 0, 0], [0, 1, 0, 0]];
    let weights: [[f32; 4]; 4] = [
        [1.0, 0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0, 0.0],
        [0.25, 0.75, 0.0, 0.0],
        [0.25, 0.75, 0.0, 0.0],
    ];
    let indices: [u16; 6] = [0, 1, 2, 0, 2, 3];
    let times: [f32; 2] = [0.0, 1.0];
    let rotations: [[f32; 4]; 2] = [[0.0, 0.0, 0.0, 1.0]; 2];

    let mut buf = BufferBuilder::new();
    let position = buf.push(
        bytemuck::cast_slice(&positions),
        json!({"componentType": FLOAT, "count": 4, "type": "VEC3",
               "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}),
        Some(ARRAY_BUFFER),
    );
    let normal = buf.push(
        bytemuck::cast_slice(&normals),
        json!({"componentType": FLOAT, "count": 4, "type": "VEC3"}),
        Some(ARRAY_BUFFER),
    );
    let uv = buf.push(
        bytemuck::cast_slice(&uvs),
        json!({"componentType": FLOAT, "count": 4, "type": "VEC2"}),
        Some(ARRAY_BUFFER),
    );
    let joint = buf.push(
        bytemuck::cast_slice(&joints),
        json!({"componentType": UNSIGNED_SHORT, "count": 4, "type": "VEC4"}),
        Some(ARRAY_BUFFER),
    );
    let weight = buf.push(
        bytemuck::cast_slice(&weights),
        json!({"componentType": FLOAT, "count": 4, "type": "VEC4"}),
        Some(ARRAY_BUFFER),
    );
    let index = buf.push(
        bytemuck::cast_slice(&indices),
        json!({"componentType": UNSIGNED_SHORT, "count": 6, "type": "SCALAR"}),
        Some(ELEMENT_ARRAY_BUFFER),
    );
    let time = buf.push(
        bytemuck::cast_slice(&times),
        json!({"componentType": FLOAT, "count": 2, "type": "SCALAR",
               "min": [0.0], "max": [1.0]}),
        None,
    );
    let translation = buf.push(
        bytemuck::cast_slice(&TIP_KEYS),
        json!({"componentType": FLOAT, "count": 2, "type": "VEC3"}),
        None,
    );
    let rotation = buf.push(
        bytemuck::cast_slice(&rotations),
        json!({"componentType": FLOAT, "count": 2, "type": "VEC4"}),
        None,
    );

    let root = json!({
        "asset": {"version": "2.0", "generator": "apg-export tests"},
        "scene": 0,
        "scenes": [{"nodes": [0, 2]}],
        "nodes": [
            {"name": "Root", "translation": ROOT_TRANSLATION, "children": [1]},
            {"name": "Tip", "translation": TIP_KEYS[0]},
            {"name": "Quad", "mesh": 0, "skin": 0}
        ],
        "meshes": [{
            "name": "Quad",
            "primitives": [{
                "attributes": {
                    "POSITION": position,
                    "NORMAL": normal,
                    "TEXCOORD_0": uv,
                    "JOINTS_0": joint,
                    "WEIGHTS_0": weight
                },
                "indices": index
            }]
        }],
        "skins": [{"name": "Armature", "joints": [0, 1]}],
        "animations": [{
            "name": "Wave",
            "samplers": [
                {"input": time, "output": translation, "interpolation": "LINEAR"},
                {"input": time, "output": rotation, "interpolation": "LINEAR"}
            ],
            "channels": [
                {"sampler": 0, "target": {"node": 1, "path": "translation"}},
                {"sampler": 1, "target": {"node": 0, "path": "rotation"}}
            ]
        }],
        "buffers": [{"byteLength": buf.data.len()}],
        "bufferViews": buf.views,
        "accessors": buf.accessors,
    });

    assemble_glb(&root, &buf.data)
}

/// Wrap JSON + binary payload in a GLB container
fn assemble_glb(root: &Value, buffer_data: &[u8]) -> Vec<u8> {
    let json_string = serde_json::to_string(root).expect("Failed to serialize JSON");
    let json_bytes = json_string.as_bytes();

    // Pad JSON to 4-byte alignment
    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let json_chunk_length = json_bytes.len() + json_padding;

    // Pad buffer to 4-byte alignment
    let buffer_padding = (4 - (buffer_data.len() % 4)) % 4;
    let buffer_chunk_length = buffer_data.len() + buffer_padding;

    let total_length = 12 + 8 + json_chunk_length + 8 + buffer_chunk_length;
    let mut glb = Vec::with_capacity(total_length);

    // Header
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    // JSON chunk
    glb.extend_from_slice(&(json_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&0x4E4F534Au32.to_le_bytes());
    glb.extend_from_slice(json_bytes);
    glb.extend(std::iter::repeat_n(0x20u8, json_padding));

    // BIN chunk
    glb.extend_from_slice(&(buffer_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&0x004E4942u32.to_le_bytes());
    glb.extend_from_slice(buffer_data);
    glb.extend(std::iter::repeat_n(0u8, buffer_padding));

    glb
}

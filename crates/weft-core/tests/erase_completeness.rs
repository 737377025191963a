// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Destroying a node leaves no trace in any identity structure.
//!
//! Random interleavings of translate and destroy over a small shading chain.
//! The seed is pinned so a failure replays identically everywhere; set
//! `PROPTEST_SEED` locally to explore other sequences.
#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]

mod common;

use proptest::prelude::*;
use proptest::test_runner::{Config as PropConfig, RngAlgorithm, TestRng, TestRunner};

use common::at;
use weft_core::{SessionSettings, TranslationSession, Translator};
use weft_dry_tests::{flat_shader, MockHost, MockRenderer};
use weft_port::{EntityKind, EntityRef};

#[derive(Clone, Copy, Debug)]
enum Op {
    Translate(usize),
    Destroy(usize),
}

/// Four chained flat shaders (each fed by the previous) and one mesh per
/// shader.
fn chain_scene(host: &MockHost) -> Vec<EntityRef> {
    let mut entities = Vec::new();
    let mut previous = None;
    for i in 0..4 {
        let shader = flat_shader(host, &format!("S{i}"), [0.1, 0.2, 0.3]);
        if let Some(upstream) = previous {
            host.connect_shader(shader, "color", upstream);
        }
        previous = Some(shader);
        entities.push(shader);
    }
    let meshes: Vec<_> = entities
        .iter()
        .enumerate()
        .map(|(i, shader)| {
            let mesh = host.add(EntityKind::PolyMesh, &format!("M{i}"));
            host.connect_shader(mesh, "shader", *shader);
            mesh
        })
        .collect();
    entities.extend(meshes);
    entities
}

#[test]
fn proptest_seed_pinned_destroy_purges_every_structure() {
    const SEED_BYTES: [u8; 32] = [
        0x57, 0x45, 0x46, 0x54, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0,
    ];

    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, &SEED_BYTES);
    let mut runner = TestRunner::new_with_rng(PropConfig::default(), rng);

    let op = prop_oneof![
        (0usize..8).prop_map(Op::Translate),
        (0usize..64).prop_map(Op::Destroy),
    ];
    let ops = prop::collection::vec(op, 1..40);

    runner
        .run(&ops, |ops| {
            let host = MockHost::new();
            let entities = chain_scene(&host);
            let mut renderer = MockRenderer::standard();
            let mut session = TranslationSession::new(SessionSettings::default());

            for op in ops {
                match op {
                    Op::Translate(i) => {
                        let mut tr = Translator::new(&mut session, &host, &mut renderer, at(1.0));
                        tr.translate_entity(entities[i]).expect("translate");
                    }
                    Op::Destroy(pick) => {
                        let live: Vec<_> = renderer.nodes.keys().copied().collect();
                        if live.is_empty() {
                            continue;
                        }
                        let handle = live[pick % live.len()];
                        session.destroy_node(&mut renderer, handle).expect("destroy");
                        prop_assert_eq!(session.references(handle), 0);
                        prop_assert!(renderer.node(handle).is_none());
                    }
                }
                prop_assert!(renderer.dangling_references().is_empty());
                // One time, one map entry per live node.
                prop_assert_eq!(
                    renderer.live_count(),
                    session.nodes().len() + session.shaders().len()
                );
            }
            Ok(())
        })
        .expect("destroy leaves no stale handles");
}

#[test]
fn retranslating_after_destroy_creates_a_fresh_node() {
    let host = MockHost::new();
    let entities = chain_scene(&host);
    let mut renderer = MockRenderer::standard();
    let mut session = TranslationSession::new(SessionSettings::default());

    let first = {
        let mut tr = Translator::new(&mut session, &host, &mut renderer, at(1.0));
        tr.translate_entity(entities[1]).unwrap().unwrap()
    };
    let upstream = renderer.find_by_name("S0.1").unwrap();
    assert_eq!(renderer.link_of(first, "color"), Some(upstream));

    session.destroy_node(&mut renderer, upstream).unwrap();
    assert_eq!(renderer.link_of(first, "color"), None);

    let again = {
        let mut tr = Translator::new(&mut session, &host, &mut renderer, at(1.0));
        tr.translate_entity(entities[0]).unwrap().unwrap()
    };
    assert_ne!(again, upstream);
    assert_eq!(session.references(upstream), 0);
}

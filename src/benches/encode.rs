#[macro_use]
extern crate criterion;
extern crate evtmc;

use criterion::Criterion;
use evtmc::model::*;
use evtmc::{Compiler, CompilerSettings, Diagnostics, Guid};

/// A provider with `n` events, each with its own template, level and keyword.
fn wide_manifest(n: u16) -> Manifest {
    let mut p = Provider::new("Bench-Provider", Guid::new(0x1234_5678, 1, 2, [3; 8]));
    let channel = p
        .add_channel(Channel::new("Bench-Provider/Operational", 16))
        .unwrap();

    let levels: Vec<LevelId> = (1..=5u8)
        .map(|v| p.add_level(Level::new(format!("level{v}"), v)).unwrap())
        .collect();
    let keywords: Vec<KeywordId> = (0..32u32)
        .map(|bit| {
            p.add_keyword(Keyword::new(format!("kw{bit}"), 1u64 << bit))
                .unwrap()
        })
        .collect();

    for i in 0..n {
        let template = p
            .add_template(
                Template::new(format!("t{i}"))
                    .with_property(DataProperty::new("Name", InType::UnicodeString))
                    .with_property(DataProperty::new("Size", InType::UInt32))
                    .with_property(
                        DataProperty::new("Data", InType::Binary)
                            .with_length(Cardinality::Property("Size".to_string())),
                    ),
            )
            .unwrap();
        p.add_event(Event {
            channel: Some(channel),
            level: Some(levels[usize::from(i) % levels.len()]),
            keywords: vec![keywords[usize::from(i) % keywords.len()]],
            template: Some(template),
            message: Some(Message::new(format!("event{i}"))),
            ..Event::new(i, 0)
        })
        .unwrap();
    }

    let mut m = Manifest::new();
    m.add_provider(p).unwrap();
    m
}

fn criterion_benchmark(c: &mut Criterion) {
    let manifest = wide_manifest(500);
    let compiler = Compiler::new(CompilerSettings::new());

    c.bench_function("compile 500 events", move |b| {
        b.iter(|| {
            let mut diagnostics = Diagnostics::new();
            compiler.compile(&manifest, &mut diagnostics).unwrap()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

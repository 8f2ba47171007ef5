//! Benchmarks for the PHP serialize codec.

use std::borrow::Cow;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use php_serialize_core::{
    decode_session, encode_session, from_bytes, serialize, to_bytes, unserialize, PhpSession,
    PhpValue,
};

/// Named serialized documents shared by the decode and encode groups.
fn fixtures() -> Vec<(&'static str, Vec<u8>)> {
    let indexed = |n: usize| {
        let items: String = (0..n).map(|i| format!("i:{};i:{};", i, i * 2)).collect();
        format!("a:{}:{{{}}}", n, items)
    };

    let assoc: String = {
        let items: String = (0..100)
            .map(|i| {
                let key = format!("key_{}", i);
                format!("s:{}:\"{}\";i:{};", key.len(), key, i)
            })
            .collect();
        format!("a:100:{{{}}}", items)
    };

    let floats: String = {
        let items: String = (0..100i32)
            .map(|i| format!("i:{};d:{};", i, f64::from(i) / 7.0))
            .collect();
        format!("a:100:{{{}}}", items)
    };

    let nested = |depth: usize| {
        let mut s = String::from("s:4:\"leaf\";");
        for _ in 0..depth {
            s = format!("a:1:{{s:1:\"k\";{}}}", s);
        }
        s
    };

    let object = concat!(
        r#"O:4:"User":3:{s:4:"name";s:5:"Alice";"#,
        r#"s:11:"\0User\0email";s:17:"alice@example.com";"#,
        r#"s:8:"\0*\0roles";a:2:{i:0;s:5:"admin";i:1;s:6:"editor";}}"#,
    )
    .replace("\\0", "\0");

    vec![
        ("int", b"i:1234567890;".to_vec()),
        ("float", b"d:3.141592653589793;".to_vec()),
        ("string_10kb", format!("s:10000:\"{}\";", "x".repeat(10_000)).into_bytes()),
        ("string_1mb", format!("s:1000000:\"{}\";", "x".repeat(1_000_000)).into_bytes()),
        ("indexed_10", indexed(10).into_bytes()),
        ("indexed_1000", indexed(1000).into_bytes()),
        ("assoc_100", assoc.into_bytes()),
        ("floats_100", floats.into_bytes()),
        ("nested_50", nested(50).into_bytes()),
        ("object", object.into_bytes()),
    ]
}

fn decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for (name, data) in fixtures() {
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &data, |b, data| {
            b.iter(|| from_bytes(black_box(data)))
        });
    }

    group.finish();
}

fn encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for (name, data) in fixtures() {
        let value = from_bytes(&data).unwrap().into_owned();
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &value, |b, value| {
            b.iter(|| to_bytes(black_box(value)))
        });
    }

    group.finish();
}

fn custom_payloads(c: &mut Criterion) {
    let mut group = c.benchmark_group("custom_payload");

    let spl = br#"C:11:"ArrayObject":21:{x:i:0;a:0:{};m:a:0:{}}"#;
    group.throughput(Throughput::Bytes(spl.len() as u64));
    group.bench_function("decode_raw", |b| b.iter(|| from_bytes(black_box(spl))));
    group.bench_function("decode_recursive", |b| b.iter(|| unserialize(black_box(spl))));

    let value = unserialize(spl).unwrap();
    group.bench_function("encode_recursive", |b| b.iter(|| serialize(black_box(&value))));

    group.finish();
}

fn sessions(c: &mut Criterion) {
    let mut group = c.benchmark_group("session");

    let data = br#"user|s:5:"alice";visits|i:42;cart|a:2:{i:0;s:4:"book";i:1;s:3:"pen";}flash|N;"#;
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("decode", |b| b.iter(|| decode_session(black_box(data))));

    let session: PhpSession = vec![
        (Cow::Borrowed("user"), PhpValue::from("alice")),
        (Cow::Borrowed("visits"), PhpValue::Int(42)),
        (Cow::Borrowed("cart"), PhpValue::list(vec!["book".into(), "pen".into()])),
        (Cow::Borrowed("flash"), PhpValue::Null),
    ];
    group.bench_function("encode", |b| b.iter(|| encode_session(black_box(&session))));

    group.finish();
}

#[cfg(feature = "serde")]
fn json_conversion(c: &mut Criterion) {
    use php_serialize_core::json::to_json_string;

    let mut group = c.benchmark_group("json");

    let data = br#"a:3:{s:4:"name";s:5:"Alice";s:3:"age";i:30;s:4:"tags";a:2:{i:0;s:5:"admin";i:1;s:6:"active";}}"#;

    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("decode_and_convert", |b| {
        b.iter(|| {
            let value = from_bytes(black_box(data)).unwrap();
            to_json_string(&value).unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, decode, encode, custom_payloads, sessions);

#[cfg(feature = "serde")]
criterion_group!(serde_benches, json_conversion);

#[cfg(feature = "serde")]
criterion_main!(benches, serde_benches);

#[cfg(not(feature = "serde"))]
criterion_main!(benches);

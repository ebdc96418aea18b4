//! Benchmarks for the session wire formats

use std::hint::black_box;
use std::time::{Duration, SystemTime};

use authgate_session::{AesGcmCipher, FieldCipher, Session, SessionCodec};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

fn create_session(token_len: usize) -> Session {
    Session {
        email: "user@example.com".into(),
        user: "123456789".into(),
        access_token: "a".repeat(token_len),
        id_token: "i".repeat(token_len),
        refresh_token: "r".repeat(token_len / 4),
        expires_on: Some(SystemTime::now() + Duration::from_secs(3600)),
        ..Session::default()
    }
}

fn bench_plain(c: &mut Criterion) {
    let mut group = c.benchmark_group("plain");
    let session = create_session(0);
    let encoded = SessionCodec::encode(&session, None).unwrap();

    group.bench_function("encode", |b| {
        b.iter(|| black_box(SessionCodec::encode(black_box(&session), None)));
    });
    group.bench_function("decode", |b| {
        b.iter(|| black_box(SessionCodec::decode(black_box(&encoded), None)));
    });
    group.finish();
}

fn bench_encrypted(c: &mut Criterion) {
    let mut group = c.benchmark_group("encrypted");
    let cipher = AesGcmCipher::new(&[7u8; 32]);
    let cipher_ref: &dyn FieldCipher = &cipher;

    for token_len in [256usize, 1024, 4096] {
        let session = create_session(token_len);
        let encoded = SessionCodec::encode(&session, Some(cipher_ref)).unwrap();
        group.throughput(Throughput::Bytes(encoded.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("encode", token_len),
            &session,
            |b, session| {
                b.iter(|| black_box(SessionCodec::encode(session, Some(cipher_ref))));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("decode", token_len),
            &encoded,
            |b, encoded| {
                b.iter(|| black_box(SessionCodec::decode(encoded, Some(cipher_ref))));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_plain, bench_encrypted);
criterion_main!(benches);

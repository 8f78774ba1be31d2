//! Integration tests for chirp-synth: voices, tables and the factory working
//! together the way the engine drives them.

use std::sync::Arc;

use chirp_synth::{
    AdrTimes, Envelope, Lehmer32, Mixer, NoiseLayout, Rand, RandAlgorithm, SoundWave, VoiceFactory,
    VoiceSettings, VoiceTable, WaveParams, WaveProperties, WaveType, precalculate_noise, waveform,
};

const SAMPLE_RATE: f64 = 48_000.0;

#[test]
fn test_optimized_sawtooth_110hz_half_period() {
    let params = WaveParams::new(110.0, 12);
    let t = 1.0 / 110.0 / 2.0;
    assert!(waveform::sample(WaveType::SawtoothOptimized, &params, t).abs() < 1e-9);
}

#[test]
fn test_render_and_audio_tables_agree() {
    // the render side and the audio side each hold their own copy of a voice
    let rng = Rand::new(RandAlgorithm::Lehmer32, 2024);
    let mut factory = VoiceFactory::new(VoiceSettings::default(), SAMPLE_RATE, rng).unwrap();

    let mut render = VoiceTable::new(8);
    let mut audio = VoiceTable::new(8);
    for (i, wave_type) in [WaveType::Sine, WaveType::Sawtooth, WaveType::NoisePrecalculated]
        .into_iter()
        .enumerate()
    {
        let wave = factory.create(wave_type, i as f64 * 0.05).unwrap();
        audio.insert(wave.clone());
        render.insert(wave);
    }

    let mixer = Mixer::default();
    let mut rng_a = Lehmer32::new(1);
    let mut rng_b = Lehmer32::new(2);
    for n in 0..4_800 {
        let t = n as f64 / SAMPLE_RATE * 10.0;
        let a = mixer.mix(t, audio.slots_mut(), &mut rng_a);
        let b = mixer.mix(t, render.slots_mut(), &mut rng_b);
        assert_eq!(a, b, "diverged at {t}");
    }
}

#[test]
fn test_precalculated_noise_shared_between_copies() {
    let mut rng = Lehmer32::new(3);
    let times = AdrTimes::new(0.1, 0.01, 0.2);
    let layout = NoiseLayout::new(SAMPLE_RATE, 0.5, times, 1.0);
    let noise = precalculate_noise(&mut rng, layout.count);

    let props = WaveProperties::new(WaveType::NoisePrecalculated, 0.0, 0.5, 0.0);
    let wave = SoundWave::new(props, Envelope::new(times, 1.0, 0.8))
        .unwrap()
        .with_noise(Arc::clone(&noise), layout.samples_per_second);
    let copy = wave.clone();

    assert_eq!(Arc::strong_count(&noise), 3);
    assert!(Arc::ptr_eq(wave.noise().unwrap(), copy.noise().unwrap()));
}

#[test]
fn test_table_sweep_lifecycle() {
    let env = Envelope::new(AdrTimes::new(0.01, 0.01, 0.05), 1.0, 0.8);
    let mut table = VoiceTable::new(4);
    for start in [0.0, 0.2, 0.4] {
        let props = WaveProperties::new(WaveType::Triangle, 330.0, 0.1, start);
        let mut wave = SoundWave::new(props, env).unwrap();
        wave.start(start);
        table.insert(wave);
    }
    assert_eq!(table.live_count(), 3);

    // first voice ends at 0.1, release done after 0.15
    assert_eq!(table.sweep(0.16), 1);
    assert_eq!(table.sweep(0.36), 1);
    assert_eq!(table.sweep(1.0), 1);
    assert_eq!(table.live_count(), 0);

    let mixer = Mixer::default();
    let mut rng = Lehmer32::new(0);
    assert_eq!(mixer.mix(1.0, table.slots_mut(), &mut rng), 0.0);
}

#[test]
fn test_overflowing_table_keeps_newest() {
    let rng = Rand::new(RandAlgorithm::Lehmer32, 5);
    let mut factory = VoiceFactory::new(VoiceSettings::default(), SAMPLE_RATE, rng).unwrap();
    let mut table = VoiceTable::new(4);

    let starts: Vec<f64> = (0..10).map(|i| f64::from(i) * 0.01).collect();
    for &start in &starts {
        table.insert(factory.create(WaveType::Sine, start).unwrap());
    }

    let mut kept: Vec<f64> = table
        .slots()
        .iter()
        .map(|w| w.properties().start_time)
        .collect();
    kept.sort_by(f64::total_cmp);
    assert_eq!(kept, starts[6..].to_vec());
}

use crate::config::Configuration;
use crate::error::Result;
use crate::framing::Header;
use crate::symbols::{payload_symbol_count, symbols_to_header, symbols_to_payload, HEADER_SYMBOLS};
use crate::tone::ToneDemodulator;
use crate::trigger::{TriggerAnalyzer, TriggerProgress};
use log::{debug, warn};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecoderState {
    /// Feeding the trigger analyzer
    Scanning,
    /// Collecting the header words, `next_word` is the absolute position of the next word
    Header { next_word: u64 },
    Payload {
        next_word: u64,
        header: Header,
        expected_symbols: usize,
    },
}

/// Streaming receiver
///
/// Audio is pushed in chunks of any size. The decoder waits for a trigger, demodulates the
/// header words that follow it, then the payload words the header announces, and goes back
/// to scanning. Decoded payloads are queued for [`pop_message`](Self::pop_message).
pub struct Decoder {
    config: Configuration,
    analyzer: TriggerAnalyzer,
    demodulator: ToneDemodulator,
    state: DecoderState,
    /// Recent samples, `cache[0]` sits at absolute position `cache_start`
    cache: Vec<f32>,
    cache_start: u64,
    /// Absolute position of the next sample to be pushed
    position: u64,
    /// Next sample to feed the trigger analyzer
    scan_position: u64,
    symbols: Vec<u8>,
    messages: VecDeque<Result<Vec<u8>>>,
}

impl Decoder {
    pub fn new(config: Configuration) -> Result<Self> {
        Ok(Self {
            analyzer: TriggerAnalyzer::from_configuration(&config)?,
            demodulator: ToneDemodulator::new(&config),
            state: DecoderState::Scanning,
            cache: Vec::new(),
            cache_start: 0,
            position: 0,
            scan_position: 0,
            symbols: Vec::new(),
            messages: VecDeque::new(),
            config,
        })
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Feed the next chunk of audio
    ///
    /// Returns true when at least one message became available during the call.
    pub fn push_samples(&mut self, samples: &[f32]) -> Result<bool> {
        self.cache.extend_from_slice(samples);
        self.position += samples.len() as u64;

        let pending = self.messages.len();
        loop {
            let progressed = match self.state {
                DecoderState::Scanning => self.scan()?,
                _ => self.receive_word()?,
            };
            if !progressed {
                break;
            }
        }
        self.trim_cache();
        Ok(self.messages.len() > pending)
    }

    /// Oldest decoded message, or the reason it could not be recovered
    pub fn pop_message(&mut self) -> Option<Result<Vec<u8>>> {
        self.messages.pop_front()
    }

    /// Drop any message in progress and scan for a new trigger from the next sample
    pub fn reset(&mut self) {
        self.analyzer.reset();
        self.cache.clear();
        self.cache_start = self.position;
        self.scan_position = self.position;
        self.symbols.clear();
        self.state = DecoderState::Scanning;
    }

    /// Samples that can be pushed before the trigger analyzer completes a window
    pub fn maximum_window_length(&self) -> usize {
        self.analyzer.maximum_window_length()
    }

    pub fn progress(&self) -> TriggerProgress {
        self.analyzer.progress()
    }

    /// Absolute position of the next sample to be pushed
    pub fn position(&self) -> u64 {
        self.position
    }

    /// True while a header or payload is being received
    pub fn is_receiving(&self) -> bool {
        self.state != DecoderState::Scanning
    }

    fn scan(&mut self) -> Result<bool> {
        let from = (self.scan_position - self.cache_start) as usize;
        if from < self.cache.len() {
            self.analyzer
                .process_samples(&self.cache[from..], self.scan_position, &mut ())?;
            self.scan_position = self.position;
        }
        let Some(first_tone) = self.analyzer.first_tone_location() else {
            return Ok(false);
        };
        if first_tone < self.cache_start {
            warn!(
                "trigger at {} is older than the sample cache, dropping it",
                first_tone
            );
            self.resume_scanning(self.position);
            return Ok(false);
        }
        debug!("trigger fired, header starts at {}", first_tone);
        self.symbols.clear();
        self.state = DecoderState::Header {
            next_word: first_tone,
        };
        Ok(true)
    }

    /// Demodulate the next word if it has fully arrived
    fn receive_word(&mut self) -> Result<bool> {
        let next_word = match self.state {
            DecoderState::Header { next_word } | DecoderState::Payload { next_word, .. } => {
                next_word
            }
            DecoderState::Scanning => return Ok(false),
        };
        let word_length = self.config.word_length();
        let word_end = next_word + word_length as u64;
        if word_end > self.position {
            return Ok(false);
        }
        let offset = (next_word - self.cache_start) as usize;
        let (low, high) = self
            .demodulator
            .demodulate_word(&self.cache[offset..offset + word_length])?;
        self.symbols.push(low);
        self.symbols.push(high);

        match self.state {
            DecoderState::Header { .. } if self.symbols.len() < HEADER_SYMBOLS => {
                self.state = DecoderState::Header {
                    next_word: word_end,
                };
            }
            DecoderState::Header { .. } => match symbols_to_header(&self.symbols) {
                Some(header) => {
                    debug!(
                        "header: {} bytes, level {}, crc {}",
                        header.length, header.ecc_level, header.crc
                    );
                    self.symbols.clear();
                    let expected_symbols = payload_symbol_count(&header);
                    if expected_symbols == 0 {
                        self.finish_message(header, word_end);
                    } else {
                        self.state = DecoderState::Payload {
                            next_word: word_end,
                            header,
                            expected_symbols,
                        };
                    }
                }
                None => {
                    debug!("header rejected at {}, resuming scan", next_word);
                    self.resume_scanning(word_end);
                }
            },
            DecoderState::Payload {
                header,
                expected_symbols,
                ..
            } => {
                if self.symbols.len() >= expected_symbols {
                    self.finish_message(header, word_end);
                } else {
                    self.state = DecoderState::Payload {
                        next_word: word_end,
                        header,
                        expected_symbols,
                    };
                }
            }
            DecoderState::Scanning => {}
        }
        Ok(true)
    }

    fn finish_message(&mut self, header: Header, end: u64) {
        let message = symbols_to_payload(&self.symbols, &header);
        match &message {
            Ok(payload) => debug!("message of {} bytes complete at {}", payload.len(), end),
            Err(e) => warn!("message ending at {} is corrupted: {}", end, e),
        }
        self.messages.push_back(message);
        self.resume_scanning(end);
    }

    fn resume_scanning(&mut self, from: u64) {
        self.analyzer.reset();
        self.symbols.clear();
        self.scan_position = from.max(self.cache_start);
        self.state = DecoderState::Scanning;
    }

    /// Drop samples no longer reachable by the trigger rewind or the next word
    fn trim_cache(&mut self) {
        let keep_from = match self.state {
            DecoderState::Scanning => {
                let rewind = (2 * self.config.gate_length() + self.config.window_length()) as u64;
                self.scan_position.saturating_sub(rewind)
            }
            DecoderState::Header { next_word } | DecoderState::Payload { next_word, .. } => {
                next_word
            }
        };
        let drop = (keep_from.saturating_sub(self.cache_start) as usize).min(self.cache.len());
        // Batched so single-sample pushes do not shift the whole cache every time
        if drop >= self.config.word_length() {
            self.cache.drain(..drop);
            self.cache_start += drop as u64;
        }
    }
}

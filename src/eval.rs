//! The mutable state threaded through one evaluation of a compiled template.

use rand::rngs::StdRng;
use rand::Rng;

use crate::error::MapperError;
use crate::globals::GlobalContext;

/// The collaborator that turns feature IDs into readable identifier words.
///
/// The template engine only calls it; generating the words is up to the implementation.
pub trait FidMapper {
    /// The identifier already generated for `fid`.
    fn magic_fid(&self, fid: &str) -> Result<String, MapperError>;

    /// The identifier for `fid`, generating one from `function` if it is new.
    fn new_magic_fid(&mut self, fid: &str, function: &str) -> Result<String, MapperError>;

    /// Make `genome_id` the genome for the features that follow.
    fn store_genome(&mut self, genome_id: &str, genome_name: &str) -> Result<(), MapperError>;
}

/// Everything a command may consult or advance while it renders a record.
pub struct Eval<'a> {
    pub(crate) globals: &'a dyn GlobalContext,
    pub(crate) rng: &'a mut StdRng,
    pub(crate) mapper: &'a mut Option<Box<dyn FidMapper>>,
}

impl<'a> Eval<'a> {
    pub fn new(
        globals: &'a dyn GlobalContext,
        rng: &'a mut StdRng,
        mapper: &'a mut Option<Box<dyn FidMapper>>,
    ) -> Self {
        Eval {
            globals,
            rng,
            mapper,
        }
    }

    pub fn globals(&self) -> &'a dyn GlobalContext {
        self.globals
    }

    /// Move `n` randomly chosen elements to the front of `list`, in random order.
    ///
    /// This is a partial Fisher-Yates shuffle, so it draws exactly `n` numbers from the
    /// generator (fewer if the list is shorter).
    pub fn shuffle_front<T>(&mut self, list: &mut [T], n: usize) {
        let n = n.min(list.len());
        for i in 0..n {
            let j = self.rng.gen_range(i..list.len());
            list.swap(i, j);
        }
    }

    /// `count` distinct members of the named choice set, in random order.
    pub fn sample(&mut self, set_name: &str, count: usize) -> Vec<String> {
        let globals = self.globals;
        let Some(set) = globals.choice_set(set_name) else {
            return Vec::new();
        };
        let mut list: Vec<String> = set.iter().cloned().collect();
        self.shuffle_front(&mut list, count);
        list.truncate(count);
        list
    }

    /// Candidate answers for a multiple-choice question.
    ///
    /// If the set has no more than `num` members they are all returned, shuffled. Otherwise
    /// `num` random wrong answers are picked and `answer` overwrites one of them.
    pub fn choices(&mut self, set_name: &str, answer: &str, num: usize) -> Vec<String> {
        let globals = self.globals;
        let Some(set) = globals.choice_set(set_name) else {
            return Vec::new();
        };
        let n = set.len();
        if num >= n {
            let mut list: Vec<String> = set.iter().cloned().collect();
            self.shuffle_front(&mut list, n);
            list
        } else {
            let mut list: Vec<String> = set.iter().filter(|x| *x != answer).cloned().collect();
            self.shuffle_front(&mut list, num);
            list.truncate(num);
            let idx = self.rng.gen_range(0..num);
            list[idx] = answer.to_string();
            list
        }
    }

    pub fn mapper(&mut self) -> Result<&mut (dyn FidMapper + 'static), MapperError> {
        self.mapper.as_deref_mut().ok_or(MapperError::NoMapper)
    }
}

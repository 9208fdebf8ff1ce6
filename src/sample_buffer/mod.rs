use std::collections::VecDeque;
use std::sync::Mutex;

//bounded fifo window over telemetry: newest kept, oldest evicted on overflow.
//shared between the ingest thread and whoever renders/consumes, so access
//goes through an internal lock and snapshot() hands back a copy.
pub struct SampleBuffer<T>{
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> SampleBuffer<T>{
    pub fn new(capacity: usize) -> Self{
        assert!(capacity > 0, "capacity must be greater than 0");
        SampleBuffer{
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    //push one sample, evicting the oldest when full
    pub fn push(&self, item: T){
        let mut buf = self.inner.lock().unwrap();
        if buf.len() == self.capacity{
            buf.pop_front();
        }
        buf.push_back(item);
        debug_assert!(buf.len() <= self.capacity);
    }

    //contents in insertion order, without consuming
    pub fn snapshot(&self) -> Vec<T>{
        let buf = self.inner.lock().unwrap();
        return buf.iter().cloned().collect();
    }

    //most recent sample, without consuming
    pub fn latest(&self) -> Option<T>{
        let buf = self.inner.lock().unwrap();
        return buf.back().cloned();
    }

    pub fn len(&self) -> usize{
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool{
        self.inner.lock().unwrap().is_empty()
    }

    pub fn capacity(&self) -> usize{
        self.capacity
    }

    pub fn clear(&self){
        self.inner.lock().unwrap().clear();
    }
}

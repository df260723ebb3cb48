use std::collections::{BTreeMap, HashSet};

use uuid::Uuid;

use super::{Account, AccountType, BookRecord, Entity, ObjectKind, Slots};

/// A persistable object owned by a [`Book`].
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    guid: Uuid,
    entity: Entity,
    pub slots: Slots,
    dirty: bool,
    destroying: bool,
}

impl Instance {
    /// A freshly created instance; it starts dirty.
    pub fn new(guid: Uuid, entity: Entity) -> Self {
        Self {
            guid,
            entity,
            slots: Slots::new(),
            dirty: true,
            destroying: false,
        }
    }

    /// An instance reconstructed from storage; it starts clean.
    pub fn loaded(guid: Uuid, entity: Entity) -> Self {
        Self {
            dirty: false,
            ..Self::new(guid, entity)
        }
    }

    pub fn guid(&self) -> Uuid {
        self.guid
    }

    pub fn kind(&self) -> ObjectKind {
        self.entity.kind()
    }

    pub fn type_tag(&self) -> &'static str {
        self.kind().type_tag()
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_destroying(&self) -> bool {
        self.destroying
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn set_destroying(&mut self, destroying: bool) {
        self.destroying = destroying;
    }

    pub fn as_account(&self) -> Option<&Account> {
        match &self.entity {
            Entity::Account(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_transaction(&self) -> Option<&super::Transaction> {
        match &self.entity {
            Entity::Transaction(t) => Some(t),
            _ => None,
        }
    }
}

/// The in-memory collection of every object belonging to one dataset.
///
/// The book record (root and template root accounts) is itself an instance
/// keyed by the book's GUID.
#[derive(Debug, Clone)]
pub struct Book {
    guid: Uuid,
    instances: BTreeMap<Uuid, Instance>,
    dirty: bool,
    event_suspend_depth: u32,
}

impl Default for Book {
    fn default() -> Self {
        Self::new()
    }
}

impl Book {
    /// A new dataset with its root and template root accounts.
    pub fn new() -> Self {
        let mut book = Self::empty(Uuid::new_v4());
        book.init_roots();
        book
    }

    /// A collection with no objects at all, ready to be filled by a load.
    pub fn empty(guid: Uuid) -> Self {
        Self {
            guid,
            instances: BTreeMap::new(),
            dirty: false,
            event_suspend_depth: 0,
        }
    }

    pub fn guid(&self) -> Uuid {
        self.guid
    }

    /// Adopt a book record read from storage. The book takes on the stored
    /// GUID.
    pub fn install_record(&mut self, guid: Uuid, record: BookRecord) {
        self.instances.remove(&self.guid);
        self.guid = guid;
        self.instances
            .insert(guid, Instance::loaded(guid, Entity::Book(record)));
    }

    /// Create the book record and both root accounts if they do not exist yet.
    pub fn init_roots(&mut self) {
        if self.record().is_some() {
            return;
        }
        let root = self.insert(Entity::Account(Account::new(
            "Root Account",
            AccountType::Root,
            None,
        )));
        let template_root = self.insert(Entity::Account(Account::new(
            "Template Root",
            AccountType::Root,
            None,
        )));
        self.insert_with_guid(
            self.guid,
            Entity::Book(BookRecord {
                root_account: root,
                template_root,
            }),
        );
    }

    pub fn record(&self) -> Option<&BookRecord> {
        match self.instances.get(&self.guid).map(|i| i.entity()) {
            Some(Entity::Book(record)) => Some(record),
            _ => None,
        }
    }

    pub fn root_account(&self) -> Option<Uuid> {
        self.record().map(|r| r.root_account)
    }

    pub fn template_root(&self) -> Option<Uuid> {
        self.record().map(|r| r.template_root)
    }

    /// Add a new object. It starts dirty and the book becomes unsaved.
    pub fn insert(&mut self, entity: Entity) -> Uuid {
        let guid = Uuid::new_v4();
        self.insert_with_guid(guid, entity);
        guid
    }

    pub fn insert_with_guid(&mut self, guid: Uuid, entity: Entity) {
        self.instances.insert(guid, Instance::new(guid, entity));
        self.dirty = true;
    }

    /// Add an object reconstructed from storage without touching any flag.
    pub fn insert_loaded(&mut self, instance: Instance) {
        self.instances.insert(instance.guid(), instance);
    }

    pub fn get(&self, guid: &Uuid) -> Option<&Instance> {
        self.instances.get(guid)
    }

    pub fn get_mut(&mut self, guid: &Uuid) -> Option<&mut Instance> {
        self.instances.get_mut(guid)
    }

    /// Mutate an object's payload, marking it and the book dirty.
    pub fn edit<F: FnOnce(&mut Entity)>(&mut self, guid: &Uuid, f: F) -> bool {
        match self.instances.get_mut(guid) {
            Some(instance) => {
                f(&mut instance.entity);
                instance.mark_dirty();
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Flag an object for destruction; the next commit deletes its rows.
    pub fn begin_destroy(&mut self, guid: &Uuid) -> bool {
        match self.instances.get_mut(guid) {
            Some(instance) => {
                instance.set_destroying(true);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, guid: &Uuid) -> Option<Instance> {
        self.instances.remove(guid)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    pub fn of_kind(&self, kind: ObjectKind) -> impl Iterator<Item = &Instance> {
        self.instances.values().filter(move |i| i.kind() == kind)
    }

    /// Direct children of an account, ordered by name.
    pub fn children(&self, parent: &Uuid) -> Vec<Uuid> {
        let mut children: Vec<(&str, Uuid)> = self
            .of_kind(ObjectKind::Account)
            .filter_map(|i| {
                let account = i.as_account()?;
                (account.parent.as_ref() == Some(parent)).then_some((account.name.as_str(), i.guid()))
            })
            .collect();
        children.sort();
        children.into_iter().map(|(_, guid)| guid).collect()
    }

    /// Every account below `root`, each visited once, parents before children.
    pub fn descendants(&self, root: &Uuid) -> Vec<Uuid> {
        let mut result = Vec::new();
        let mut seen = HashSet::from([*root]);
        let mut stack = self.children(root);
        stack.reverse();
        while let Some(guid) = stack.pop() {
            if !seen.insert(guid) {
                continue;
            }
            result.push(guid);
            let mut children = self.children(&guid);
            children.reverse();
            stack.extend(children);
        }
        result
    }

    /// Transactions with at least one split in the tree rooted at `root`
    /// (root included), each returned once, ordered by post date.
    pub fn tree_transactions(&self, root: &Uuid) -> Vec<Uuid> {
        let mut accounts: HashSet<Uuid> = self.descendants(root).into_iter().collect();
        accounts.insert(*root);

        let mut txns: Vec<(time::Date, Uuid)> = self
            .of_kind(ObjectKind::Transaction)
            .filter_map(|i| {
                let txn = i.as_transaction()?;
                txn.splits
                    .iter()
                    .any(|s| accounts.contains(&s.account))
                    .then_some((txn.post_date, i.guid()))
            })
            .collect();
        txns.sort();
        txns.into_iter().map(|(_, guid)| guid).collect()
    }

    /// True when the collection holds changes that were never saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Clear the dirty flag of every instance and of the book itself.
    pub fn mark_all_clean(&mut self) {
        for instance in self.instances.values_mut() {
            instance.mark_clean();
        }
        self.dirty = false;
    }

    pub fn suspend_events(&mut self) {
        self.event_suspend_depth += 1;
    }

    pub fn resume_events(&mut self) {
        self.event_suspend_depth = self.event_suspend_depth.saturating_sub(1);
    }

    pub fn events_suspended(&self) -> bool {
        self.event_suspend_depth > 0
    }
}
